use thiserror::Error;

use parkcast_compute::PipelineError;
use parkcast_storage::StorageError;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Unknown model type: {0}")]
    UnknownModelKind(String),

    #[error("Model not trained yet")]
    NotTrained,

    #[error("expected {expected} feature values per row, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("model backend error: {0}")]
    Backend(String),

    #[error("unsupported model file format version {0}")]
    UnsupportedFormat(u64),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
