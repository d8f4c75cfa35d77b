pub mod preprocessing;
pub mod contours;
pub mod regions;
pub mod selection;
pub mod ocr;
pub mod tesseract;

use image::{DynamicImage, GrayImage};

use crate::models::{DetectionCandidate, RecognizedText};

pub use ocr::{ModelStore, OcrsRecognizer};
pub use regions::ContourRegionDetector;
pub use selection::{clamp_box, select_region};
pub use tesseract::TesseractRecognizer;

/// Proposes brand-name regions on a package photo.
///
/// Implementations must be safe to share between concurrent runs; any model
/// state they hold is read-only after construction.
pub trait RegionDetector: Send + Sync {
    /// Candidate regions with confidence in `[0, 1]`. An empty list is a
    /// valid answer.
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<DetectionCandidate>>;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;
}

/// Reads text from a preprocessed grayscale crop
pub trait TextRecognizer: Send + Sync {
    /// Recognized fragments in reading order; may be empty
    fn recognize(&self, image: &GrayImage) -> anyhow::Result<RecognizedText>;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;
}
