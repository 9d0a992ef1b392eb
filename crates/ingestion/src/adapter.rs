use configuration::{ColumnMapping, SourceSettings};
use core_types::{IntermediateRecord, RawRecord, RawValue, SourceKind};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// A record the engine could not accept, kept with its reason for diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub source: SourceKind,
    /// Row position inside the source extract.
    pub position: usize,
    pub native_id: Option<String>,
    pub reason: crate::error::ReasonCode,
    pub detail: String,
}

impl RejectedRecord {
    pub fn new(
        source: SourceKind,
        position: usize,
        native_id: Option<String>,
        error: &RecordError,
    ) -> Self {
        Self {
            source,
            position,
            native_id,
            reason: error.reason_code(),
            detail: error.to_string(),
        }
    }
}

/// The output of running one adapter over a whole extract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptedStream {
    pub records: Vec<IntermediateRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// The capability every source adapter provides: rename one raw record onto the
/// canonical field set.
///
/// Implementations are pure and look at one record at a time.
pub trait RecordAdapter {
    fn source(&self) -> SourceKind;

    /// Adapts the raw record found at `position` in the extract.
    fn adapt(&self, position: usize, raw: &RawRecord) -> Result<IntermediateRecord, RecordError>;

    /// Adapts a whole extract, quarantining the records that fail.
    fn adapt_all(&self, raws: &[RawRecord]) -> AdaptedStream {
        let mut stream = AdaptedStream::default();
        for (position, raw) in raws.iter().enumerate() {
            match self.adapt(position, raw) {
                Ok(record) => stream.records.push(record),
                Err(error) => {
                    tracing::debug!(source = %self.source(), position, %error, "record failed mapping");
                    stream
                        .rejected
                        .push(RejectedRecord::new(self.source(), position, None, &error));
                }
            }
        }
        stream
    }
}

/// One adapter per supported source system, each carrying its mapping table.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceAdapter {
    Solicitudes(ColumnMapping),
    AtencionCiudadana(ColumnMapping),
    Seguimiento(ColumnMapping),
}

impl SourceAdapter {
    pub fn new(kind: SourceKind, mapping: ColumnMapping) -> Self {
        match kind {
            SourceKind::Solicitudes => SourceAdapter::Solicitudes(mapping),
            SourceKind::AtencionCiudadana => SourceAdapter::AtencionCiudadana(mapping),
            SourceKind::Seguimiento => SourceAdapter::Seguimiento(mapping),
        }
    }

    /// Builds the adapter with the built-in mapping table for `kind`.
    pub fn with_default_mapping(kind: SourceKind) -> Self {
        Self::new(kind, ColumnMapping::default_for(kind))
    }

    pub fn from_settings(settings: &SourceSettings) -> Self {
        Self::new(settings.kind, settings.mapping())
    }

    pub fn mapping(&self) -> &ColumnMapping {
        match self {
            SourceAdapter::Solicitudes(m)
            | SourceAdapter::AtencionCiudadana(m)
            | SourceAdapter::Seguimiento(m) => m,
        }
    }

    fn required<'r>(
        &self,
        raw: &'r RawRecord,
        field: &'static str,
        column: &str,
    ) -> Result<&'r RawValue, RecordError> {
        raw.get(column).ok_or_else(|| RecordError::Mapping {
            kind: self.source(),
            field,
            column: column.to_string(),
        })
    }
}

/// Reads an optional mapped column; unmapped or absent columns read as null.
fn optional(raw: &RawRecord, column: Option<&String>) -> RawValue {
    column
        .and_then(|c| raw.get(c))
        .cloned()
        .unwrap_or(RawValue::Null)
}

impl RecordAdapter for SourceAdapter {
    fn source(&self) -> SourceKind {
        match self {
            SourceAdapter::Solicitudes(_) => SourceKind::Solicitudes,
            SourceAdapter::AtencionCiudadana(_) => SourceKind::AtencionCiudadana,
            SourceAdapter::Seguimiento(_) => SourceKind::Seguimiento,
        }
    }

    fn adapt(&self, position: usize, raw: &RawRecord) -> Result<IntermediateRecord, RecordError> {
        let mapping = self.mapping();

        let native_id = self
            .required(raw, "request_id", &mapping.request_id)?
            .as_text()
            .ok_or(RecordError::MissingField { field: "request_id" })?;
        let requested_at = self
            .required(raw, "requested_at", &mapping.requested_at)?
            .clone();

        Ok(IntermediateRecord {
            source: self.source(),
            position,
            native_id,
            requested_at,
            resolved_at: optional(raw, mapping.resolved_at.as_ref()),
            category: optional(raw, mapping.category.as_ref()).as_text(),
            status: optional(raw, mapping.status.as_ref()).as_text(),
            attention_hours: optional(raw, mapping.attention_hours.as_ref()),
        })
    }
}
