use image::{DynamicImage, GrayImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::dilate;

use crate::error::PipelineError;
use crate::models::CropRegion;

/// Median filter radius for recognizer input (3x3 window)
pub const DENOISE_RADIUS: u32 = 1;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Grow edge pixels so neighbouring glyphs merge into one block
pub fn merge_edges(edges: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return edges.clone();
    }
    dilate(edges, Norm::LInf, radius)
}

/// Remove single-pixel speckle without smearing strokes
pub fn denoise(img: &GrayImage) -> GrayImage {
    median_filter(img, DENOISE_RADIUS, DENOISE_RADIUS)
}

/// Cut the half-open pixel range `[x1, x2) x [y1, y2)` out of `img`
pub fn crop_region(img: &DynamicImage, region: &CropRegion) -> DynamicImage {
    let bbox = region.bbox();
    img.crop_imm(bbox.x1, bbox.y1, bbox.width(), bbox.height())
}

/// Prepare a crop for text recognition: grayscale, then median denoise
pub fn preprocess(crop: &DynamicImage) -> Result<GrayImage, PipelineError> {
    if crop.width() == 0 || crop.height() == 0 {
        return Err(PipelineError::InvalidCrop(format!(
            "crop has zero area ({}x{})",
            crop.width(),
            crop.height()
        )));
    }
    Ok(denoise(&to_grayscale(crop)))
}
