use std::sync::Arc;

use image::{DynamicImage, GrayImage};
pub use ocrs::{ImageSource, OcrEngine};
use ocrs::OcrEngineParams;
use rten::Model;
use tracing::info;

use crate::config::ModelConfig;
use crate::detection::TextRecognizer;
use crate::error::PipelineError;
use crate::models::RecognizedText;

/// Initialize the OCR engine from the configured model directory
pub fn init_ocr_engine(config: &ModelConfig) -> Result<OcrEngine, PipelineError> {
    let detection_model_path = config.detection_model_path();
    let recognition_model_path = config.recognition_model_path();

    if !detection_model_path.exists() || !recognition_model_path.exists() {
        return Err(PipelineError::Configuration(format!(
            "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
             Expected locations:\n  - {}\n  - {}",
            detection_model_path.display(),
            recognition_model_path.display()
        )));
    }

    let load = |path: &std::path::Path| {
        Model::load_file(path).map_err(|e| {
            PipelineError::Configuration(format!("failed to load model {}: {}", path.display(), e))
        })
    };
    let detection_model = load(detection_model_path.as_path())?;
    let recognition_model = load(recognition_model_path.as_path())?;

    OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| PipelineError::Configuration(format!("failed to create OCR engine: {}", e)))
}

/// Models loaded once at startup and shared read-only by every run
#[derive(Clone)]
pub struct ModelStore {
    ocr: Arc<OcrEngine>,
}

impl ModelStore {
    pub fn load(config: &ModelConfig) -> Result<Self, PipelineError> {
        info!(models_dir = %config.models_dir.display(), "loading OCR models");
        let engine = init_ocr_engine(config)?;
        Ok(Self { ocr: Arc::new(engine) })
    }

    pub fn ocr_engine(&self) -> Arc<OcrEngine> {
        self.ocr.clone()
    }
}

/// Text recognizer backed by the ocrs engine
pub struct OcrsRecognizer {
    engine: Arc<OcrEngine>,
}

impl OcrsRecognizer {
    pub fn new(engine: Arc<OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn from_store(store: &ModelStore) -> Self {
        Self::new(store.ocr_engine())
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn recognize(&self, image: &GrayImage) -> anyhow::Result<RecognizedText> {
        // ocrs takes RGB input
        let img = DynamicImage::ImageLuma8(image.clone()).to_rgb8();

        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| anyhow::anyhow!("invalid OCR input image: {:?}", e))?;
        let ocr_input = self.engine.prepare_input(img_source)?;
        let text = self.engine.get_text(&ocr_input)?;

        Ok(RecognizedText::from_lines(&text))
    }

    fn name(&self) -> &str {
        "OCR Recognition"
    }
}
