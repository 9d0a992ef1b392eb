use core_types::{CanonicalDataset, CanonicalRecord, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::adapter::RejectedRecord;
use crate::consolidation::ConsolidationOutcome;
use crate::error::{IngestionError, ReasonCode};

fn create_parent(path: &Path) -> Result<(), IngestionError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|source| IngestionError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Writes the canonical dataset as CSV, one row per record, timestamps in RFC 3339.
pub fn write_canonical_csv(dataset: &CanonicalDataset, path: &Path) -> Result<(), IngestionError> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for record in dataset {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), records = dataset.len(), "canonical dataset written");
    Ok(())
}

/// Reads a dataset previously written by [`write_canonical_csv`].
pub fn read_canonical_csv(path: &Path) -> Result<CanonicalDataset, IngestionError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<CanonicalRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(path = %path.display(), records = records.len(), "canonical dataset read");
    Ok(CanonicalDataset::new(records))
}

pub fn write_rejected_csv(rejected: &[RejectedRecord], path: &Path) -> Result<(), IngestionError> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for record in rejected {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Counts of quarantined records, for quick diagnosis of a consolidation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionSummary {
    pub total_input: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub rejection_rate: f64,
    pub by_reason: BTreeMap<ReasonCode, usize>,
    pub by_source: BTreeMap<SourceKind, usize>,
}

impl RejectionSummary {
    pub fn from_outcome(outcome: &ConsolidationOutcome) -> Self {
        let mut by_reason = BTreeMap::new();
        let mut by_source = BTreeMap::new();
        for record in &outcome.rejected {
            *by_reason.entry(record.reason).or_insert(0) += 1;
            *by_source.entry(record.source).or_insert(0) += 1;
        }
        Self {
            total_input: outcome.total_input(),
            accepted: outcome.dataset.len(),
            rejected: outcome.rejected.len(),
            rejection_rate: outcome.rejection_rate(),
            by_reason,
            by_source,
        }
    }
}

pub fn write_rejection_summary(
    summary: &RejectionSummary,
    path: &Path,
) -> Result<(), IngestionError> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })
}
