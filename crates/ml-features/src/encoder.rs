use core_types::CanonicalDataset;
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

/// Code given to labels the encoder never saw during fitting.
pub const UNKNOWN_CODE: i64 = -1;

/// Maps labels to integer codes by their position in the sorted set of fitted labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    field: String,
    classes: Vec<String>,
}

impl CategoricalEncoder {
    pub fn fit<I, S>(field: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self {
            field: field.into(),
            classes,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode_checked(&self, label: &str) -> Result<i64, FeatureError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .map(|idx| idx as i64)
            .map_err(|_| FeatureError::UnknownCategory {
                field: self.field.clone(),
                label: label.to_string(),
            })
    }

    /// Encodes `label`, falling back to [`UNKNOWN_CODE`] for unseen labels.
    pub fn encode(&self, label: &str) -> i64 {
        self.encode_checked(label).unwrap_or_else(|error| {
            tracing::debug!(%error, "encoding unseen label as unknown");
            UNKNOWN_CODE
        })
    }

    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
    }
}

/// The three encoders a feature vector needs, fitted together on one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSet {
    pub category: CategoricalEncoder,
    pub status: CategoricalEncoder,
    pub source: CategoricalEncoder,
}

impl EncoderSet {
    pub fn fit(dataset: &CanonicalDataset) -> Result<Self, FeatureError> {
        if dataset.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }
        Ok(Self {
            category: CategoricalEncoder::fit("category", dataset.iter().map(|r| r.category.as_str())),
            status: CategoricalEncoder::fit("status", dataset.iter().map(|r| r.status.as_str())),
            source: CategoricalEncoder::fit("source", dataset.iter().map(|r| r.source.code())),
        })
    }
}
