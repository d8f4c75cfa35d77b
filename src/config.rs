//! Runtime configuration shared by the binary and library users.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::{ModelStore, OcrsRecognizer, TesseractRecognizer, TextRecognizer};
use crate::error::PipelineError;
use crate::labels::LabelSourceConfig;

/// Location of the ocrs detection/recognition models
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
}

impl ModelConfig {
    /// `$HOME/.cache/ocrs`, where `ocrs-cli` downloads its models
    pub fn default_models_dir() -> Result<PathBuf, PipelineError> {
        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| {
                PipelineError::Configuration("neither HOME nor USERPROFILE is set".to_string())
            })?;
        Ok(Path::new(&home_dir).join(".cache/ocrs"))
    }

    pub fn detection_model_path(&self) -> PathBuf {
        self.models_dir.join("text-detection.rten")
    }

    pub fn recognition_model_path(&self) -> PathBuf {
        self.models_dir.join("text-recognition.rten")
    }
}

/// Which text recognizer reads the brand crop
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecognizerKind {
    /// Built-in ocrs engine (needs the .rten models)
    Ocrs,
    /// External tesseract binary
    Tesseract,
}

/// Everything needed to assemble a pipeline at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub models: ModelConfig,
    pub labels: LabelSourceConfig,
    pub recognizer: RecognizerKind,
    pub tesseract: TesseractRecognizer,
    pub debug_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load the configured recognizer. Missing model files or a missing
    /// tesseract binary fail here, before any image is processed.
    pub fn build_recognizer(&self) -> Result<Arc<dyn TextRecognizer>, PipelineError> {
        match self.recognizer {
            RecognizerKind::Ocrs => {
                let store = ModelStore::load(&self.models)?;
                Ok(Arc::new(OcrsRecognizer::from_store(&store)))
            }
            RecognizerKind::Tesseract => {
                self.tesseract.ensure_available()?;
                Ok(Arc::new(self.tesseract.clone()))
            }
        }
    }
}
