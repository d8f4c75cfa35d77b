use image::DynamicImage;
use tracing::trace;

use crate::detection::{contours, preprocessing, RegionDetector};
use crate::models::DetectionCandidate;

/// Model-free brand region detector.
///
/// Finds dense blocks of edges (text lines, logos) and scores each block by
/// its area relative to the largest block, so the most prominent lettering on
/// the package gets confidence 1.0.
#[derive(Debug, Clone)]
pub struct ContourRegionDetector {
    pub blur_sigma: f32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    /// Dilation radius used to merge glyphs into blocks
    pub merge_radius: u8,
    /// Minimum bounding-box area of a block, in pixels
    pub min_area: u64,
    /// Blocks covering more than this share of the image are treated as
    /// package outline and ignored
    pub max_coverage: f32,
}

impl Default for ContourRegionDetector {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            low_threshold: 50.0,
            high_threshold: 100.0,
            merge_radius: 4,
            min_area: 64,
            max_coverage: 0.9,
        }
    }
}

impl RegionDetector for ContourRegionDetector {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<DetectionCandidate>> {
        let image_area = image.width() as u64 * image.height() as u64;
        if image_area == 0 {
            return Ok(Vec::new());
        }

        let gray = preprocessing::to_grayscale(image);
        let blurred = preprocessing::apply_blur(&gray, self.blur_sigma);
        let edges = preprocessing::detect_edges(&blurred, self.low_threshold, self.high_threshold);
        let merged = preprocessing::merge_edges(&edges, self.merge_radius);

        let blocks: Vec<_> = contours::find_contours(&merged, 1)
            .into_iter()
            .filter(|c| {
                let area = c.box_area();
                area >= self.min_area && (area as f64 / image_area as f64) <= self.max_coverage as f64
            })
            .collect();

        let Some(largest) = blocks.iter().map(|c| c.box_area()).max() else {
            return Ok(Vec::new());
        };

        let candidates = blocks
            .iter()
            .map(|c| {
                let confidence = (c.box_area() as f64 / largest as f64) as f32;
                trace!(
                    x = c.min_x, y = c.min_y, w = c.width(), h = c.height(),
                    aspect = c.aspect_ratio(), confidence,
                    "edge block"
                );
                DetectionCandidate::new(c.to_candidate_box(), confidence)
            })
            .collect();

        Ok(candidates)
    }

    fn name(&self) -> &str {
        "Contour Region Detection"
    }
}
