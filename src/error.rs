use thiserror::Error;

/// Errors raised by the brand pipeline.
///
/// Only `Decode`, `Configuration` and `Worker` ever reach a caller of
/// [`BrandPipeline`](crate::pipeline::BrandPipeline); the other variants are
/// absorbed into empty/default result fields.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid crop region: {0}")]
    InvalidCrop(String),

    #[error("label lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("pipeline worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Failures talking to a drug label source.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response body: {0}")]
    Body(String),
}
