use chrono::{DateTime, Utc};
use core_types::{CanonicalDataset, RequestStatus, SourceKind};

use crate::encoder::EncoderSet;
use crate::error::FeatureError;
use crate::rolling::RollingHistory;
use crate::vector::{FeatureVector, TemporalParts};

/// Derives feature vectors with encoders fitted once and reused unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBuilder {
    encoders: EncoderSet,
}

impl FeatureBuilder {
    /// Fits the categorical encoders on `dataset`.
    pub fn fit(dataset: &CanonicalDataset) -> Result<Self, FeatureError> {
        let encoders = EncoderSet::fit(dataset)?;
        tracing::debug!(
            categories = encoders.category.len(),
            statuses = encoders.status.len(),
            sources = encoders.source.len(),
            "encoders fitted"
        );
        Ok(Self { encoders })
    }

    /// Rebuilds a builder around encoders restored from a trained artifact.
    pub fn from_encoders(encoders: EncoderSet) -> Self {
        Self { encoders }
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    pub fn into_encoders(self) -> EncoderSet {
        self.encoders
    }

    /// One feature vector per record, in dataset order.
    ///
    /// Rolling counts see only same-category requests strictly earlier than each
    /// record, so no record contributes to its own features.
    pub fn build(&self, dataset: &CanonicalDataset) -> Vec<FeatureVector> {
        let history = RollingHistory::from_dataset(dataset);
        dataset
            .iter()
            .map(|r| self.build_one(r.requested_at, &r.category, r.status, r.source, &history))
            .collect()
    }

    pub fn build_one(
        &self,
        at: DateTime<Utc>,
        category: &str,
        status: RequestStatus,
        source: SourceKind,
        history: &RollingHistory,
    ) -> FeatureVector {
        let parts = TemporalParts::of(at);
        let [rolling_count_7d, rolling_count_14d, rolling_count_30d] =
            history.rolling_counts(category, at);

        FeatureVector {
            year: parts.year,
            month: parts.month,
            day: parts.day,
            day_of_week: parts.day_of_week,
            hour: parts.hour,
            quarter: parts.quarter,
            day_of_year: parts.day_of_year,
            week_of_year: parts.week_of_year,
            rolling_count_7d,
            rolling_count_14d,
            rolling_count_30d,
            category_code: self.encoders.category.encode(category),
            status_code: self.encoders.status.encode(status.as_str()),
            source_code: self.encoders.source.encode(source.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::UNKNOWN_CODE;
    use chrono::{Duration, TimeZone};
    use core_types::CanonicalRecord;

    fn record(id: usize, category: &str, at: DateTime<Utc>) -> CanonicalRecord {
        CanonicalRecord {
            request_id: format!("solicitudes-{id}"),
            source: SourceKind::Solicitudes,
            native_id: id.to_string(),
            requested_at: at,
            resolved_at: None,
            category: category.to_string(),
            status: RequestStatus::Pending,
            attention_hours: None,
        }
    }

    #[test]
    fn features_align_with_records() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        let dataset = CanonicalDataset::new(vec![
            record(1, "Agua", start),
            record(2, "Agua", start + Duration::days(2)),
            record(3, "Baches", start + Duration::days(3)),
            record(4, "Agua", start + Duration::days(10)),
        ]);
        let builder = FeatureBuilder::fit(&dataset).unwrap();
        let features = builder.build(&dataset);

        assert_eq!(features.len(), dataset.len());
        assert_eq!(features[0].rolling_count_7d, 0);
        assert_eq!(features[1].rolling_count_7d, 1);
        assert_eq!(features[2].category_code, 1);
        assert_eq!(features[2].rolling_count_30d, 0);
        // Day 10: day 2 is inside the 14-day window but not the 7-day one.
        assert_eq!(features[3].rolling_count_7d, 0);
        assert_eq!(features[3].rolling_count_14d, 2);
    }

    #[test]
    fn simultaneous_requests_do_not_count_each_other() {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        let dataset = CanonicalDataset::new(vec![record(1, "Agua", at), record(2, "Agua", at)]);
        let features = FeatureBuilder::fit(&dataset).unwrap().build(&dataset);
        assert!(features.iter().all(|f| f.rolling_count_7d == 0));
    }

    #[test]
    fn reused_encoders_map_new_labels_to_unknown() {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        let training = CanonicalDataset::new(vec![record(1, "Agua", at)]);
        let builder = FeatureBuilder::fit(&training).unwrap();

        let vector = builder.build_one(
            at,
            "Mercados",
            RequestStatus::Resolved,
            SourceKind::Seguimiento,
            &RollingHistory::new(),
        );
        assert_eq!(vector.category_code, UNKNOWN_CODE);
        assert_eq!(vector.status_code, UNKNOWN_CODE);
        assert_eq!(vector.source_code, UNKNOWN_CODE);
    }
}
