use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;

/// Text formats accepted for timestamps, tried in order. Naive values are taken as UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Placeholders that extraction tools write for missing cells.
const NULL_MARKERS: &[&str] = &["null", "none", "nan", "nat", "n/a"];

/// 2^63; integral floats at or beyond it do not fit an `i64`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// A single cell of a raw extract, before any interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty()
                    || NULL_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m))
            }
            RawValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Renders the value as trimmed text, or `None` when null.
    ///
    /// Integral floats render without a fractional part so that identifiers exported
    /// as `42.0` line up with the same identifier exported as `42`.
    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        match self {
            RawValue::Null => None,
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Float(f) if f.fract() == 0.0 && f.abs() < I64_LIMIT => {
                Some(format!("{}", *f as i64))
            }
            RawValue::Float(f) => Some(f.to_string()),
            RawValue::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Interprets the value as a number. Decimal commas are accepted.
    pub fn as_f64(&self, field: &str) -> Result<Option<f64>, CoreError> {
        if self.is_null() {
            return Ok(None);
        }
        let invalid = || CoreError::InvalidNumber {
            field: field.to_string(),
            value: self.as_text().unwrap_or_default(),
        };
        match self {
            RawValue::Integer(i) => Ok(Some(*i as f64)),
            RawValue::Float(f) if f.is_finite() => Ok(Some(*f)),
            RawValue::Text(s) => {
                let trimmed = s.trim();
                let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
                    trimmed.replace(',', ".")
                } else {
                    trimmed.to_string()
                };
                normalized
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }

    /// Interprets the value as a UTC timestamp.
    ///
    /// Integers are read as Unix seconds. Text is tried against RFC 3339 first, then
    /// the naive datetime formats, then bare dates (midnight).
    pub fn as_timestamp(&self, field: &str) -> Result<Option<DateTime<Utc>>, CoreError> {
        if self.is_null() {
            return Ok(None);
        }
        let unparseable = || CoreError::UnparseableTimestamp {
            field: field.to_string(),
            value: self.as_text().unwrap_or_default(),
        };
        match self {
            RawValue::Timestamp(ts) => Ok(Some(Utc.from_utc_datetime(ts))),
            RawValue::Integer(secs) => DateTime::from_timestamp(*secs, 0)
                .map(Some)
                .ok_or_else(unparseable),
            RawValue::Text(s) => parse_timestamp(s.trim()).map(Some).ok_or_else(unparseable),
            _ => Err(unparseable()),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// One row of a raw extract, keyed by the source-native column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for tests and in-memory extracts.
    pub fn with(mut self, column: impl Into<String>, value: RawValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: RawValue) {
        self.fields.insert(column.into(), value);
    }

    /// Looks a column up by exact name, falling back to a case-insensitive match.
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.fields.get(column).or_else(|| {
            self.fields
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, value)| value)
        })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RawValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, RawValue)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}
