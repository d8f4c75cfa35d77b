use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Rgb};
use medlabel::{
    CandidateBox, DetectionCandidate, DrugLabelSource, LookupError, RecognizedText, RegionDetector,
    TextRecognizer,
};
use serde_json::{Value, json};

/// Creates a 120x80 package-coloured test image
pub fn create_test_image() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(120, 80, |x, _| {
        Rgb([200u8, (x % 255) as u8, 40u8])
    }))
}

/// The test image encoded as PNG bytes
pub fn create_test_png() -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    create_test_image()
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

pub fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> DetectionCandidate {
    DetectionCandidate::new(CandidateBox::new(x1, y1, x2, y2), confidence)
}

/// Detector returning a fixed candidate list
pub struct FixedDetector {
    pub candidates: Vec<DetectionCandidate>,
}

impl RegionDetector for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<DetectionCandidate>> {
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &str {
        "Fixed Detector"
    }
}

/// Detector that always errors
pub struct FailingDetector;

impl RegionDetector for FailingDetector {
    fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<DetectionCandidate>> {
        anyhow::bail!("detector exploded")
    }

    fn name(&self) -> &str {
        "Failing Detector"
    }
}

/// Recognizer returning fixed fragments and remembering the crop sizes it saw
pub struct FixedRecognizer {
    pub fragments: Vec<String>,
    pub calls: AtomicUsize,
    pub last_size: Mutex<Option<(u32, u32)>>,
}

impl FixedRecognizer {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            calls: AtomicUsize::new(0),
            last_size: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for FixedRecognizer {
    fn recognize(&self, image: &GrayImage) -> anyhow::Result<RecognizedText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_size.lock().unwrap() = Some(image.dimensions());
        Ok(RecognizedText::new(self.fragments.clone()))
    }

    fn name(&self) -> &str {
        "Fixed Recognizer"
    }
}

/// Recognizer that holds its thread for `delay` before answering, like a
/// CPU-bound OCR model would
pub struct SlowRecognizer {
    pub delay: Duration,
    pub text: String,
}

impl TextRecognizer for SlowRecognizer {
    fn recognize(&self, _image: &GrayImage) -> anyhow::Result<RecognizedText> {
        std::thread::sleep(self.delay);
        Ok(RecognizedText::new(vec![self.text.clone()]))
    }

    fn name(&self) -> &str {
        "Slow Recognizer"
    }
}

/// Recognizer that always errors
pub struct FailingRecognizer;

impl TextRecognizer for FailingRecognizer {
    fn recognize(&self, _image: &GrayImage) -> anyhow::Result<RecognizedText> {
        anyhow::bail!("recognizer exploded")
    }

    fn name(&self) -> &str {
        "Failing Recognizer"
    }
}

/// How a [`RecordingLabelSource`] answers
pub enum SourceBehaviour {
    Found(Value),
    NotFound,
    Fails,
}

/// Label source that records every query
pub struct RecordingLabelSource {
    pub behaviour: SourceBehaviour,
    pub queries: Mutex<Vec<String>>,
}

impl RecordingLabelSource {
    pub fn new(behaviour: SourceBehaviour) -> Self {
        Self {
            behaviour,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl DrugLabelSource for RecordingLabelSource {
    async fn search(&self, brand_name: &str) -> Result<Option<Value>, LookupError> {
        self.queries.lock().unwrap().push(brand_name.to_string());
        match &self.behaviour {
            SourceBehaviour::Found(document) => Ok(Some(document.clone())),
            SourceBehaviour::NotFound => Ok(None),
            SourceBehaviour::Fails => Err(LookupError::Body("connection reset".to_string())),
        }
    }
}

/// Trimmed-down openFDA label document for Tylenol
pub fn tylenol_label() -> Value {
    json!({
        "openfda": { "brand_name": ["Tylenol"] },
        "active_ingredient": ["Active ingredient (in each caplet) Acetaminophen 500 mg"],
        "purpose": ["Purpose Pain reliever/fever reducer"],
        "indications_and_usage": ["Uses temporarily relieves minor aches and pains"],
        "warnings": ["Warnings Liver warning: This product contains acetaminophen."],
        "dosage_and_administration": ["Directions do not take more than directed"],
        "inactive_ingredient": ["Inactive ingredients cellulose, corn starch"]
    })
}
