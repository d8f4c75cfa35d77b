//! openFDA drug label client

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{LookupError, PipelineError};
use crate::labels::DrugLabelSource;

pub const DEFAULT_BASE_URL: &str = "https://api.fda.gov";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Upper bound on a label response body; real single-label answers are well
/// under 1 MiB
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Connection settings for the label endpoint
#[derive(Debug, Clone)]
pub struct LabelSourceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for LabelSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// openFDA `drug/label.json` search response
#[derive(Debug, Deserialize)]
struct LabelSearchResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,
}

/// Client for the openFDA drug label API.
///
/// One request per lookup, bounded by the configured timeout. There are no
/// retries: a miss for a brand name stays a miss.
#[derive(Debug, Clone)]
pub struct OpenFdaClient {
    client: Client,
    base_url: String,
    max_body_bytes: usize,
}

impl OpenFdaClient {
    pub fn new(config: &LabelSourceConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Exact brand-name search URL for `brand_name`, limited to one result
    pub fn search_url(&self, brand_name: &str) -> String {
        format!(
            "{}/drug/label.json?search=openfda.brand_name:\"{}\"&limit=1",
            self.base_url,
            urlencoding::encode(brand_name)
        )
    }
}

/// Read a response body, refusing anything larger than `limit` bytes
async fn read_body(mut response: Response, limit: usize) -> Result<String, LookupError> {
    let too_large = || LookupError::Body(format!("response body exceeds {} bytes", limit));

    if let Some(declared) = response.content_length() {
        if declared > limit as u64 {
            return Err(too_large());
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body).map_err(|e| LookupError::Body(e.to_string()))
}

/// First document of a search response body, if any
pub fn first_result(body: &str) -> Result<Option<Value>, LookupError> {
    let response: LabelSearchResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Body(e.to_string()))?;
    Ok(response.results.and_then(|results| results.into_iter().next()))
}

impl DrugLabelSource for OpenFdaClient {
    async fn search(&self, brand_name: &str) -> Result<Option<Value>, LookupError> {
        let url = self.search_url(brand_name);
        debug!(%url, "querying label source");

        let response = self.client.get(&url).send().await?;

        // openFDA answers 404 when the search has no hits
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status()));
        }

        let body = read_body(response, self.max_body_bytes).await?;
        first_result(&body)
    }
}
