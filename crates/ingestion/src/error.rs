use core_types::{CoreError, SourceKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Why a single record was quarantined. Fatal for that record only, never for the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("source '{kind}' has no column '{column}' for required field '{field}'")]
    Mapping {
        kind: SourceKind,
        field: &'static str,
        column: String,
    },

    #[error("required field '{field}' is empty")]
    MissingField { field: &'static str },

    #[error(transparent)]
    InvalidValue(#[from] CoreError),

    #[error("data quality violation: {0}")]
    DataQuality(String),

    #[error("duplicate of an identical record already accepted as '{request_id}'")]
    Duplicate { request_id: String },

    #[error("conflicting duplicates for '{request_id}': {detail}")]
    ConflictingDuplicate { request_id: String, detail: String },
}

/// Stable, serializable reason codes for the rejection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MappingError,
    MissingField,
    UnparseableTimestamp,
    InvalidNumber,
    DataQualityError,
    Duplicate,
    ConflictingDuplicate,
}

impl RecordError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            RecordError::Mapping { .. } => ReasonCode::MappingError,
            RecordError::MissingField { .. } => ReasonCode::MissingField,
            RecordError::InvalidValue(CoreError::UnparseableTimestamp { .. }) => {
                ReasonCode::UnparseableTimestamp
            }
            RecordError::InvalidValue(_) => ReasonCode::InvalidNumber,
            RecordError::DataQuality(_) => ReasonCode::DataQualityError,
            RecordError::Duplicate { .. } => ReasonCode::Duplicate,
            RecordError::ConflictingDuplicate { .. } => ReasonCode::ConflictingDuplicate,
        }
    }
}

/// Run-level failures while reading or writing extracts.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("extraction of source '{kind}' did not finish within {secs}s")]
    ExtractionTimeout { kind: SourceKind, secs: u64 },

    #[error("extraction task for source '{kind}' failed: {detail}")]
    TaskFailed { kind: SourceKind, detail: String },
}

impl IngestionError {
    /// Timeouts are transient and worth retrying; everything else needs a fix first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestionError::ExtractionTimeout { .. })
    }
}
