#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from medlabel for tests
pub use medlabel::{
    BoundingBox, BrandInfoResult, BrandPipeline, LabelSection, PipelineError, PipelineStage,
};
