//! End-to-end tests for the brand pipeline with test doubles standing in
//! for the detector, recognizer and label source.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use serde_json::json;

fn pipeline(
    candidates: Vec<medlabel::DetectionCandidate>,
    recognizer: Arc<FixedRecognizer>,
    behaviour: SourceBehaviour,
) -> BrandPipeline<RecordingLabelSource> {
    BrandPipeline::new(
        Arc::new(FixedDetector { candidates }),
        recognizer,
        RecordingLabelSource::new(behaviour),
    )
}

#[tokio::test]
async fn test_undecodable_image_is_fatal() {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = pipeline(vec![candidate(0.0, 0.0, 10.0, 10.0, 0.9)], recognizer.clone(), SourceBehaviour::NotFound);

    let result = pipeline.run_bytes(b"definitely not an image").await;

    assert!(matches!(result, Err(PipelineError::Decode(_))));
    assert_eq!(recognizer.call_count(), 0);
    assert!(pipeline.resolver().source().queries().is_empty());
}

#[tokio::test]
async fn test_no_regions_yields_empty_result() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = pipeline(vec![], recognizer.clone(), SourceBehaviour::Found(tylenol_label()));

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    assert_eq!(outcome.stage, PipelineStage::NoRegion);
    assert_eq!(
        serde_json::to_value(&outcome.result)?,
        json!({
            "brand_raw": "",
            "brand_token": "",
            "bbox": null,
            "detector_conf": 0.0,
            "dailymed": { "setid": null, "sections": {} }
        })
    );
    assert_eq!(recognizer.call_count(), 0);
    assert!(pipeline.resolver().source().queries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_brand_text_triggers_single_lookup() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol", "Extra Strength"]));
    let pipeline = pipeline(
        vec![
            candidate(5.0, 5.0, 30.0, 20.0, 0.4),
            candidate(-10.0, 10.0, 90.0, 200.0, 0.87),
        ],
        recognizer.clone(),
        SourceBehaviour::Found(tylenol_label()),
    );

    let outcome = pipeline.run_bytes(&create_test_png()).await?;
    let result = &outcome.result;

    assert_eq!(outcome.stage, PipelineStage::Resolved);
    assert_eq!(result.brand_raw, "Tylenol Extra Strength");
    assert_eq!(result.brand_token.as_str(), "Tylenol");
    assert_eq!(result.bbox, Some(BoundingBox::new(0, 10, 90, 79)));
    assert_eq!(result.detector_conf, 0.87);
    assert_eq!(pipeline.resolver().source().queries(), vec!["Tylenol".to_string()]);

    // The recognizer sees exactly the clamped crop
    assert_eq!(*recognizer.last_size.lock().unwrap(), Some((90, 69)));

    let sections = &result.dailymed.sections;
    assert_eq!(sections.get(LabelSection::Uses), Some("temporarily relieves minor aches and pains"));
    assert_eq!(
        sections.get(LabelSection::Warnings),
        Some("Liver warning: This product contains acetaminophen.")
    );
    assert_eq!(sections.len(), 6);

    let json = serde_json::to_value(result)?;
    assert_eq!(json["bbox"], json!([0, 10, 90, 79]));
    assert_eq!(json["dailymed"]["setid"], serde_json::Value::Null);
    let keys: Vec<_> = json["dailymed"]["sections"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys.len(), 6);

    Ok(())
}

#[tokio::test]
async fn test_lookup_failure_still_resolves() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["ADVIL 200mg"]));
    let pipeline = pipeline(vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)], recognizer, SourceBehaviour::Fails);

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    assert_eq!(outcome.stage, PipelineStage::Resolved);
    assert_eq!(outcome.result.brand_token.as_str(), "ADVIL");
    assert!(outcome.result.dailymed.sections.is_empty());
    assert_eq!(pipeline.resolver().source().queries(), vec!["ADVIL".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_unmatched_token_resolves_to_empty_record() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Zzyzx"]));
    let pipeline = pipeline(vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)], recognizer, SourceBehaviour::NotFound);

    let outcome = pipeline.run_image(&create_test_image()).await;

    assert_eq!(outcome.stage, PipelineStage::Resolved);
    assert!(outcome.result.dailymed.sections.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_boilerplate_only_text_skips_lookup() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Extra Strength", "Tablets"]));
    let pipeline = pipeline(
        vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)],
        recognizer,
        SourceBehaviour::Found(tylenol_label()),
    );

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    assert_eq!(outcome.stage, PipelineStage::NoToken);
    assert_eq!(outcome.result.brand_raw, "Extra Strength Tablets");
    assert!(outcome.result.brand_token.is_empty());
    assert_eq!(outcome.result.bbox, Some(BoundingBox::new(10, 10, 60, 40)));
    assert!(outcome.result.dailymed.sections.is_empty());
    assert!(pipeline.resolver().source().queries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_recognizer_failure_is_no_token() -> anyhow::Result<()> {
    let pipeline = BrandPipeline::new(
        Arc::new(FixedDetector { candidates: vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)] }),
        Arc::new(FailingRecognizer),
        RecordingLabelSource::new(SourceBehaviour::Found(tylenol_label())),
    );

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    assert_eq!(outcome.stage, PipelineStage::NoToken);
    assert_eq!(outcome.result.brand_raw, "");
    assert_eq!(outcome.result.detector_conf, 0.6);
    assert!(pipeline.resolver().source().queries().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_detector_failure_is_no_region() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = BrandPipeline::new(
        Arc::new(FailingDetector),
        recognizer.clone(),
        RecordingLabelSource::new(SourceBehaviour::NotFound),
    );

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    assert_eq!(outcome.stage, PipelineStage::NoRegion);
    assert_eq!(outcome.result, BrandInfoResult::not_found());
    assert_eq!(recognizer.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_region_outside_image_is_no_region() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = pipeline(
        vec![candidate(500.0, 500.0, 600.0, 600.0, 0.99)],
        recognizer.clone(),
        SourceBehaviour::NotFound,
    );

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    assert_eq!(outcome.stage, PipelineStage::NoRegion);
    assert_eq!(outcome.result.detector_conf, 0.0);
    assert_eq!(recognizer.call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_debug_images_are_written_per_request() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_root = dir.path().join("debug");
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = pipeline(vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)], recognizer, SourceBehaviour::NotFound)
        .with_debug(debug_root.clone())?;

    let outcome = pipeline.run_bytes(&create_test_png()).await?;

    let run_dir = debug_root.join(outcome.request_id.to_string());
    for name in ["00_input.png", "01_crop.png", "02_preprocessed.png"] {
        assert!(run_dir.join(name).exists(), "missing {name}");
    }
    let crop = image::open(run_dir.join("01_crop.png"))?;
    assert_eq!((crop.width(), crop.height()), (50, 30));

    Ok(())
}

#[tokio::test]
async fn test_debug_directory_must_be_empty() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.txt"), "x")?;
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));

    let result = pipeline(vec![], recognizer, SourceBehaviour::NotFound).with_debug(dir.path().to_path_buf());

    assert!(matches!(result, Err(PipelineError::Configuration(_))));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = pipeline(
        vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)],
        recognizer.clone(),
        SourceBehaviour::Found(tylenol_label()),
    );
    let png = create_test_png();

    let (a, b) = tokio::join!(pipeline.run_bytes(&png), pipeline.run_bytes(&png));
    let (a, b) = (a?, b?);

    assert_ne!(a.request_id, b.request_id);
    assert_eq!(a.result, b.result);
    assert_eq!(recognizer.call_count(), 2);
    assert_eq!(pipeline.resolver().source().queries().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_blocking_runs_overlap() -> anyhow::Result<()> {
    let delay = Duration::from_millis(400);
    let pipeline = Arc::new(BrandPipeline::new(
        Arc::new(FixedDetector { candidates: vec![candidate(10.0, 10.0, 60.0, 40.0, 0.6)] }),
        Arc::new(SlowRecognizer { delay, text: "Tylenol".to_string() }),
        RecordingLabelSource::new(SourceBehaviour::Found(tylenol_label())),
    ));
    let png = create_test_png();

    let started = Instant::now();
    let (a, b) = tokio::join!(
        pipeline.clone().run_blocking(png.clone()),
        pipeline.clone().run_blocking(png.clone())
    );
    let elapsed = started.elapsed();
    let (a, b) = (a?, b?);

    // Two recognitions back to back would take at least 2 * delay
    assert!(elapsed < delay * 2 - Duration::from_millis(100), "runs did not overlap: {elapsed:?}");
    assert_eq!(a.stage, PipelineStage::Resolved);
    assert_eq!(a.result, b.result);
    assert_ne!(a.request_id, b.request_id);
    assert_eq!(pipeline.resolver().source().queries().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_blocking_run_matches_inline_run() -> anyhow::Result<()> {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol", "Extra Strength"]));
    let pipeline = Arc::new(pipeline(
        vec![candidate(-10.0, 10.0, 90.0, 200.0, 0.87)],
        recognizer.clone(),
        SourceBehaviour::Found(tylenol_label()),
    ));

    let inline = pipeline.run_bytes(&create_test_png()).await?;
    let pooled = pipeline.clone().run_blocking(create_test_png()).await?;

    assert_eq!(pooled.stage, inline.stage);
    assert_eq!(pooled.result, inline.result);
    assert_eq!(recognizer.call_count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_blocking_run_undecodable_image_is_fatal() {
    let recognizer = Arc::new(FixedRecognizer::new(&["Tylenol"]));
    let pipeline = Arc::new(pipeline(
        vec![candidate(0.0, 0.0, 10.0, 10.0, 0.9)],
        recognizer.clone(),
        SourceBehaviour::NotFound,
    ));

    let result = pipeline.clone().run_blocking(b"definitely not an image".to_vec()).await;

    assert!(matches!(result, Err(PipelineError::Decode(_))));
    assert_eq!(recognizer.call_count(), 0);
    assert!(pipeline.resolver().source().queries().is_empty());
}
