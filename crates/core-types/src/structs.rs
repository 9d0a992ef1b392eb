use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{RequestStatus, SourceKind};
use crate::raw::RawValue;

/// A raw record after its source-native columns have been renamed onto the canonical
/// field set. Values are still uninterpreted; parsing happens during consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateRecord {
    pub source: SourceKind,
    /// Zero-based row position inside the source extract, kept for diagnostics.
    pub position: usize,
    pub native_id: String,
    pub requested_at: RawValue,
    pub resolved_at: RawValue,
    pub category: Option<String>,
    /// `None` when the source has no status column or the cell is empty; the status is
    /// then derived from `resolved_at`.
    pub status: Option<String>,
    pub attention_hours: RawValue,
}

/// One citizen service request in the unified schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// `<source-code>-<native-id>`; unique within a canonical dataset.
    pub request_id: String,
    pub source: SourceKind,
    pub native_id: String,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub category: String,
    pub status: RequestStatus,
    pub attention_hours: Option<f64>,
}

impl CanonicalRecord {
    pub fn canonical_id(source: SourceKind, native_id: &str) -> String {
        format!("{}-{}", source.code(), native_id)
    }

    /// Hours elapsed between two timestamps, with millisecond precision.
    pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        (to - from).num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn is_resolved(&self) -> bool {
        self.status == RequestStatus::Resolved
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// The consolidated set of canonical records, in the order consolidation emitted them.
///
/// There is no mutating API: once built, a dataset is only read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalDataset {
    records: Vec<CanonicalRecord>,
}

impl CanonicalDataset {
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest_requested_at(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.requested_at).max()
    }
}

impl<'a> IntoIterator for &'a CanonicalDataset {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
