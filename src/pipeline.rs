use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::detection::preprocessing::{crop_region, preprocess};
use crate::detection::{select_region, RegionDetector, TextRecognizer};
use crate::error::PipelineError;
use crate::labels::{DrugLabelSource, LabelResolver};
use crate::models::{BrandInfoResult, DailyMedInfo, RecognizedText, RegionSelection};
use crate::token::extract_token;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs; each run writes into its own
    /// `<request id>` subdirectory
    pub output_dir: PathBuf,
    pub enabled: bool,
}

/// Where a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// The detector found no usable region
    NoRegion,
    /// A region was read but the text held no usable token; lookup skipped
    NoToken,
    /// A token was found and the label lookup was attempted
    Resolved,
}

/// Result of one run together with the stage it ended in
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub request_id: Uuid,
    pub stage: PipelineStage,
    pub result: BrandInfoResult,
}

/// Vision half of a run: selected region plus the text read from it
#[derive(Debug, Clone, PartialEq)]
pub struct BrandReading {
    pub selection: RegionSelection,
    pub text: RecognizedText,
}

/// Brand recognition and label resolution pipeline.
///
/// Holds no per-request state, so one instance can serve concurrent runs.
/// [`run_bytes`](Self::run_bytes) does detection and recognition on the
/// calling task; [`run_blocking`](Self::run_blocking) moves decoding and that
/// work onto the blocking pool so concurrent runs overlap.
pub struct BrandPipeline<S> {
    detector: Arc<dyn RegionDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    resolver: LabelResolver<S>,
    debug: Option<DebugConfig>,
}

impl<S: DrugLabelSource> BrandPipeline<S> {
    pub fn new(
        detector: Arc<dyn RegionDetector>,
        recognizer: Arc<dyn TextRecognizer>,
        source: S,
    ) -> Self {
        Self {
            detector,
            recognizer,
            resolver: LabelResolver::new(source),
            debug: None,
        }
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self, PipelineError> {
        let config_err = |e: std::io::Error| {
            PipelineError::Configuration(format!("debug directory {}: {}", output_dir.display(), e))
        };
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir).map_err(config_err)?;
            if entries.count() > 0 {
                return Err(PipelineError::Configuration(format!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(config_err)?;
        }

        self.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });
        Ok(self)
    }

    pub fn resolver(&self) -> &LabelResolver<S> {
        &self.resolver
    }

    /// Decode and process encoded image bytes.
    ///
    /// Undecodable input is the only error; every absence-of-data case is
    /// reported through [`PipelineStage`].
    pub async fn run_bytes(&self, bytes: &[u8]) -> Result<PipelineOutcome, PipelineError> {
        let image = image::load_from_memory(bytes)?;
        Ok(self.run_image(&image).await)
    }

    /// Process an already decoded image
    pub async fn run_image(&self, image: &DynamicImage) -> PipelineOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("brand_pipeline", %request_id);
        self.run_inner(request_id, image).instrument(span).await
    }

    async fn run_inner(&self, request_id: Uuid, image: &DynamicImage) -> PipelineOutcome {
        let debug_dir = self.debug_dir(request_id);
        let reading = self.read_brand(image, debug_dir.as_deref());
        self.finish(request_id, reading).await
    }

    /// Token extraction and label lookup for a finished reading
    async fn finish(&self, request_id: Uuid, reading: BrandReading) -> PipelineOutcome {
        let RegionSelection::Region(region) = reading.selection else {
            info!("no brand region found");
            return PipelineOutcome {
                request_id,
                stage: PipelineStage::NoRegion,
                result: BrandInfoResult::not_found(),
            };
        };

        let brand_raw = reading.text.joined();
        let token = extract_token(&brand_raw);
        let mut result = BrandInfoResult {
            brand_raw,
            brand_token: token.clone(),
            bbox: Some(region.bbox()),
            detector_conf: region.confidence(),
            dailymed: DailyMedInfo::default(),
        };

        if token.is_empty() {
            info!(brand_raw = %result.brand_raw, "no usable brand token, skipping label lookup");
            return PipelineOutcome {
                request_id,
                stage: PipelineStage::NoToken,
                result,
            };
        }

        info!(token = %token, "resolving label");
        result.dailymed.sections = self.resolver.resolve(&token).await;
        info!(sections = result.dailymed.sections.len(), "label resolved");

        PipelineOutcome {
            request_id,
            stage: PipelineStage::Resolved,
            result,
        }
    }

    /// Detect, select, crop, preprocess and recognize. Collaborator failures
    /// are logged and read as "nothing found".
    pub fn read_brand(&self, image: &DynamicImage, debug_dir: Option<&Path>) -> BrandReading {
        if let Some(dir) = debug_dir {
            save_debug_image(dir, "00_input.png", image);
        }

        let candidates = match self.detector.detect(image) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(detector = self.detector.name(), error = %e, "region detection failed");
                Vec::new()
            }
        };
        debug!(detector = self.detector.name(), count = candidates.len(), "region candidates");

        let selection = select_region(&candidates, image.width(), image.height());
        let RegionSelection::Region(region) = selection else {
            return BrandReading { selection, text: RecognizedText::default() };
        };
        debug!(bbox = ?region.bbox(), confidence = region.confidence(), "selected brand region");

        let crop = crop_region(image, &region);
        let gray = match preprocess(&crop) {
            Ok(gray) => gray,
            Err(e) => {
                warn!(error = %e, "discarding brand region");
                return BrandReading {
                    selection: RegionSelection::NoRegion,
                    text: RecognizedText::default(),
                };
            }
        };

        if let Some(dir) = debug_dir {
            save_debug_image(dir, "01_crop.png", &crop);
            save_debug_gray(dir, "02_preprocessed.png", &gray);
        }

        let text = match self.recognizer.recognize(&gray) {
            Ok(text) => text,
            Err(e) => {
                warn!(recognizer = self.recognizer.name(), error = %e, "text recognition failed");
                RecognizedText::default()
            }
        };
        debug!(fragments = text.fragments().len(), "recognized text");

        BrandReading { selection, text }
    }

    fn debug_dir(&self, request_id: Uuid) -> Option<PathBuf> {
        let config = self.debug.as_ref().filter(|c| c.enabled)?;
        let dir = config.output_dir.join(request_id.to_string());
        match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot create debug directory");
                None
            }
        }
    }
}

impl<S: DrugLabelSource + 'static> BrandPipeline<S> {
    /// Same as [`run_bytes`](Self::run_bytes), but decoding, detection and
    /// recognition run on tokio's blocking pool. Only the label lookup runs on
    /// the calling task.
    pub async fn run_blocking(self: Arc<Self>, bytes: Vec<u8>) -> Result<PipelineOutcome, PipelineError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("brand_pipeline", %request_id);

        async move {
            let pipeline = Arc::clone(&self);
            let worker_span = Span::current();
            let reading = tokio::task::spawn_blocking(move || {
                let _guard = worker_span.enter();
                let image = image::load_from_memory(&bytes)?;
                let debug_dir = pipeline.debug_dir(request_id);
                Ok::<_, PipelineError>(pipeline.read_brand(&image, debug_dir.as_deref()))
            })
            .await??;

            Ok(self.finish(request_id, reading).await)
        }
        .instrument(span)
        .await
    }
}

fn save_debug_image(dir: &Path, name: &str, image: &DynamicImage) {
    let path = dir.join(name);
    match image.save(&path) {
        Ok(()) => debug!(path = %path.display(), "saved debug image"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to save debug image"),
    }
}

fn save_debug_gray(dir: &Path, name: &str, image: &GrayImage) {
    save_debug_image(dir, name, &DynamicImage::ImageLuma8(image.clone()));
}
