pub mod config;
pub mod detection;
pub mod error;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod token;

pub use config::{AppConfig, ModelConfig, RecognizerKind};
pub use detection::{ContourRegionDetector, RegionDetector, TextRecognizer};
pub use error::{LookupError, PipelineError};
pub use labels::{DrugLabelSource, LabelRecord, LabelResolver, LabelSection, NoLabelSource, OpenFdaClient};
pub use models::{
    BoundingBox, BrandInfoResult, CandidateBox, CropRegion, DetectionCandidate, LookupToken,
    RecognizedText, RegionSelection,
};
pub use pipeline::{BrandPipeline, PipelineOutcome, PipelineStage};
pub use token::extract_token;
