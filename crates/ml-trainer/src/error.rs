use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("insufficient training data: {available} samples available, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("feature schema mismatch: model expects {expected:?}, predictor generates {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("prediction horizon must be at least one day, got {0}")]
    InvalidHorizon(u32),

    #[error("invalid training parameter: {0}")]
    InvalidParameter(String),

    #[error("model error: {0}")]
    Model(#[from] smartcore::error::Failed),

    #[error(transparent)]
    Feature(#[from] ml_features::FeatureError),

    #[error("no model artifact found at {0:?}")]
    ModelNotFound(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
