pub mod pipeline;

pub use pipeline::frame::{FeatureFrame, RowKey};
pub use pipeline::{FeatureConfig, FeaturePipeline, PipelineError, TARGET_COLUMN};
