use tracing::debug;

use crate::models::{BoundingBox, CandidateBox, CropRegion, DetectionCandidate, RegionSelection};

/// Clamp a raw box to `[0, width-1] x [0, height-1]`.
///
/// Coordinates are truncated to whole pixels first. The result may still be
/// degenerate when the raw box lies outside the image or is inverted.
pub fn clamp_box(bbox: &CandidateBox, width: u32, height: u32) -> BoundingBox {
    let max_x = width.saturating_sub(1) as i64;
    let max_y = height.saturating_sub(1) as i64;
    let clamp = |v: f32, max: i64| (v as i64).clamp(0, max) as u32;

    BoundingBox::new(
        clamp(bbox.x1, max_x),
        clamp(bbox.y1, max_y),
        clamp(bbox.x2, max_x),
        clamp(bbox.y2, max_y),
    )
}

/// Highest-confidence candidate; the earliest one wins a tie.
/// Candidates with a NaN confidence are never picked.
pub fn most_confident(candidates: &[DetectionCandidate]) -> Option<&DetectionCandidate> {
    let mut best: Option<&DetectionCandidate> = None;
    for candidate in candidates.iter().filter(|c| !c.confidence.is_nan()) {
        match best {
            Some(current) if candidate.confidence <= current.confidence => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Pick the brand region to crop from an image of `width` x `height`.
pub fn select_region(candidates: &[DetectionCandidate], width: u32, height: u32) -> RegionSelection {
    let Some(best) = most_confident(candidates) else {
        return RegionSelection::NoRegion;
    };

    let bbox = clamp_box(&best.bbox, width, height);
    match CropRegion::new(bbox, best.confidence) {
        Ok(region) => RegionSelection::Region(region),
        Err(e) => {
            debug!(error = %e, raw = ?best.bbox, "selected region is unusable");
            RegionSelection::NoRegion
        }
    }
}
