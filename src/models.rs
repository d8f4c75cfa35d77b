use std::fmt;

use serde::Serialize;

use crate::labels::LabelRecord;

/// Connected block of edge pixels found by the contour detector
#[derive(Debug, Clone)]
pub struct Contour {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl Contour {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Area of the bounding box, not the pixel count
    pub fn box_area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn aspect_ratio(&self) -> f32 {
        let w = self.width() as f32;
        let h = self.height() as f32;
        if h == 0.0 {
            return 0.0;
        }
        w / h
    }

    pub fn to_candidate_box(&self) -> CandidateBox {
        CandidateBox {
            x1: self.min_x as f32,
            y1: self.min_y as f32,
            x2: self.max_x as f32,
            y2: self.max_y as f32,
        }
    }
}

/// Raw detector box in pixel coordinates. May lie partly outside the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl CandidateBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for CandidateBox {
    fn from(b: BoundingBox) -> Self {
        Self::new(b.x1 as f32, b.y1 as f32, b.x2 as f32, b.y2 as f32)
    }
}

/// One region proposed by a [`RegionDetector`](crate::detection::RegionDetector)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionCandidate {
    pub bbox: CandidateBox,
    pub confidence: f32,
}

impl DetectionCandidate {
    pub fn new(bbox: CandidateBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}

/// Integer pixel box, serialized as `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[u32; 4]")]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// True when the box spans at least one pixel in both directions
    pub fn is_proper(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Clamped, non-degenerate crop rectangle with the confidence of the
/// candidate it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    bbox: BoundingBox,
    confidence: f32,
}

impl CropRegion {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Result<Self, crate::PipelineError> {
        if !bbox.is_proper() {
            return Err(crate::PipelineError::InvalidCrop(format!(
                "degenerate box [{}, {}, {}, {}]",
                bbox.x1, bbox.y1, bbox.x2, bbox.y2
            )));
        }
        Ok(Self { bbox, confidence })
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Outcome of region selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionSelection {
    NoRegion,
    Region(CropRegion),
}

impl RegionSelection {
    pub fn confidence(&self) -> f32 {
        match self {
            RegionSelection::NoRegion => 0.0,
            RegionSelection::Region(region) => region.confidence(),
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            RegionSelection::NoRegion => None,
            RegionSelection::Region(region) => Some(region.bbox()),
        }
    }
}

/// Ordered text fragments from one recognizer call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedText {
    fragments: Vec<String>,
}

impl RecognizedText {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }

    /// One fragment per non-blank line of `text`
    pub fn from_lines(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments joined with single spaces and trimmed
    pub fn joined(&self) -> String {
        self.fragments.join(" ").trim().to_string()
    }
}

/// Normalized label-source query key. Empty means no usable text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LookupToken(String);

impl LookupToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LookupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label portion of a [`BrandInfoResult`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyMedInfo {
    pub setid: Option<String>,
    pub sections: LabelRecord,
}

/// Final output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandInfoResult {
    pub brand_raw: String,
    pub brand_token: LookupToken,
    pub bbox: Option<BoundingBox>,
    pub detector_conf: f32,
    pub dailymed: DailyMedInfo,
}

impl BrandInfoResult {
    /// Result for an image where no brand region was found
    pub fn not_found() -> Self {
        Self {
            brand_raw: String::new(),
            brand_token: LookupToken::empty(),
            bbox: None,
            detector_conf: 0.0,
            dailymed: DailyMedInfo::default(),
        }
    }
}
