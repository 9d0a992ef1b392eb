use crate::error::AnalyticsError;
use crate::report::{
    AttentionTimeKpi, CategoryDemandKpi, CategoryShare, KpiReport, ResolutionRateKpi,
    TemporalTrendsKpi, WaitTimeKpi,
};
use chrono::{DateTime, Datelike, Timelike, Utc};
use configuration::KpiSettings;
use core_types::{CanonicalDataset, CanonicalRecord, RequestStatus};
use std::collections::HashMap;

/// A stateless calculator for deriving service-level KPIs from a canonical dataset.
#[derive(Debug, Clone)]
pub struct KpiEngine {
    settings: KpiSettings,
}

impl KpiEngine {
    pub fn new(settings: KpiSettings) -> Self {
        Self { settings }
    }

    /// The main entry point for calculating KPIs.
    ///
    /// # Arguments
    ///
    /// * `dataset` - The consolidated records. Never modified.
    /// * `now` - The reference time for wait times of pending requests.
    pub fn calculate(
        &self,
        dataset: &CanonicalDataset,
        now: DateTime<Utc>,
    ) -> Result<KpiReport, AnalyticsError> {
        self.validate()?;
        let records = dataset.records();

        let report = KpiReport {
            computed_at: now,
            total_records: records.len(),
            attention_time: self.calculate_attention_time(records)?,
            resolution_rate: self.calculate_resolution_rate(records),
            wait_time: self.calculate_wait_time(records, now),
            category_demand: self.calculate_category_demand(records),
            temporal_trends: self.calculate_temporal_trends(records),
        };

        tracing::info!(
            records = report.total_records,
            resolution_rate = ?report.resolution_rate.rate_pct,
            mean_attention_hours = ?report.attention_time.mean_hours,
            insufficient_data = report.has_insufficient_data(),
            "KPIs calculated"
        );
        Ok(report)
    }

    fn validate(&self) -> Result<(), AnalyticsError> {
        let threshold = self.settings.attention_threshold_hours;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "attention threshold must be a positive number of hours, got {threshold}"
            )));
        }
        let target = self.settings.resolution_target_pct;
        if !(0.0..=100.0).contains(&target) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "resolution target must be within [0, 100], got {target}"
            )));
        }
        Ok(())
    }

    fn calculate_attention_time(
        &self,
        records: &[CanonicalRecord],
    ) -> Result<AttentionTimeKpi, AnalyticsError> {
        let threshold = self.settings.attention_threshold_hours;
        let mut hours: Vec<f64> = records
            .iter()
            .filter(|r| r.is_resolved())
            .filter_map(|r| r.attention_hours)
            .collect();

        if let Some(bad) = hours.iter().find(|h| !h.is_finite()) {
            return Err(AnalyticsError::Calculation {
                metric: "attention_time",
                detail: format!("non-finite attention time {bad}"),
            });
        }

        let mut kpi = AttentionTimeKpi {
            sample_size: hours.len(),
            mean_hours: None,
            median_hours: None,
            std_dev_hours: None,
            min_hours: None,
            max_hours: None,
            threshold_hours: threshold,
            within_threshold_pct: None,
            insufficient_data: hours.is_empty(),
        };
        if hours.is_empty() {
            return Ok(kpi);
        }

        hours.sort_by(f64::total_cmp);
        let n = hours.len();
        let mean = hours.iter().sum::<f64>() / n as f64;

        kpi.mean_hours = Some(mean);
        kpi.median_hours = Some(if n % 2 == 0 {
            (hours[n / 2 - 1] + hours[n / 2]) / 2.0
        } else {
            hours[n / 2]
        });
        kpi.min_hours = hours.first().copied();
        kpi.max_hours = hours.last().copied();
        if n > 1 {
            let variance = hours.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            kpi.std_dev_hours = Some(variance.sqrt());
        }

        let within = hours.iter().filter(|&&h| h <= threshold).count();
        kpi.within_threshold_pct = Some(within as f64 / n as f64 * 100.0);
        Ok(kpi)
    }

    fn calculate_resolution_rate(&self, records: &[CanonicalRecord]) -> ResolutionRateKpi {
        let count = |status: RequestStatus| records.iter().filter(|r| r.status == status).count();
        let total = records.len();
        let resolved = count(RequestStatus::Resolved);
        let target = self.settings.resolution_target_pct;

        let rate_pct = (total > 0).then(|| resolved as f64 / total as f64 * 100.0);
        ResolutionRateKpi {
            total,
            resolved,
            pending: count(RequestStatus::Pending),
            unknown: count(RequestStatus::Unknown),
            rate_pct,
            target_pct: target,
            meets_target: rate_pct.map(|rate| rate >= target),
            insufficient_data: total == 0,
        }
    }

    fn calculate_wait_time(&self, records: &[CanonicalRecord], now: DateTime<Utc>) -> WaitTimeKpi {
        let waits: Vec<f64> = records
            .iter()
            .filter(|r| r.is_pending())
            .map(|r| CanonicalRecord::hours_between(r.requested_at, now).max(0.0))
            .collect();

        let n = waits.len();
        WaitTimeKpi {
            pending_count: n,
            mean_wait_hours: (n > 0).then(|| waits.iter().sum::<f64>() / n as f64),
            max_wait_hours: waits.iter().copied().reduce(f64::max),
            insufficient_data: n == 0,
        }
    }

    fn calculate_category_demand(&self, records: &[CanonicalRecord]) -> CategoryDemandKpi {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *counts.entry(record.category.as_str()).or_insert(0) += 1;
        }

        let total = records.len();
        let mut distribution: Vec<CategoryShare> = counts
            .into_iter()
            .map(|(category, count)| CategoryShare {
                category: category.to_string(),
                count,
                pct: count as f64 / total as f64 * 100.0,
            })
            .collect();
        distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

        CategoryDemandKpi {
            category_count: distribution.len(),
            mode_category: distribution.first().map(|share| share.category.clone()),
            distribution,
            insufficient_data: total == 0,
        }
    }

    fn calculate_temporal_trends(&self, records: &[CanonicalRecord]) -> TemporalTrendsKpi {
        let mut trends = TemporalTrendsKpi {
            insufficient_data: records.is_empty(),
            ..TemporalTrendsKpi::default()
        };
        for record in records {
            let at = record.requested_at;
            trends.by_day_of_week[at.weekday().num_days_from_monday() as usize] += 1;
            trends.by_hour[at.hour() as usize] += 1;
            *trends.by_month.entry(at.month()).or_insert(0) += 1;
            *trends.by_year.entry(at.year()).or_insert(0) += 1;
        }
        trends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_types::SourceKind;
    use proptest::prelude::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn resolved(source: SourceKind, id: &str, category: &str, hours: f64) -> CanonicalRecord {
        let requested_at = at(1, 8);
        CanonicalRecord {
            request_id: CanonicalRecord::canonical_id(source, id),
            source,
            native_id: id.to_string(),
            requested_at,
            resolved_at: Some(requested_at + Duration::minutes((hours * 60.0) as i64)),
            category: category.to_string(),
            status: RequestStatus::Resolved,
            attention_hours: Some(hours),
        }
    }

    fn pending(id: &str, category: &str, requested_at: DateTime<Utc>) -> CanonicalRecord {
        CanonicalRecord {
            request_id: CanonicalRecord::canonical_id(SourceKind::Solicitudes, id),
            source: SourceKind::Solicitudes,
            native_id: id.to_string(),
            requested_at,
            resolved_at: None,
            category: category.to_string(),
            status: RequestStatus::Pending,
            attention_hours: None,
        }
    }

    fn engine() -> KpiEngine {
        KpiEngine::new(KpiSettings::default())
    }

    #[test]
    fn three_resolved_records_from_three_sources() {
        let dataset = CanonicalDataset::new(vec![
            resolved(SourceKind::Solicitudes, "1", "Agua", 10.0),
            resolved(SourceKind::AtencionCiudadana, "1", "Agua", 20.0),
            resolved(SourceKind::Seguimiento, "1", "Baches", 30.0),
        ]);

        let report = engine().calculate(&dataset, at(10, 0)).unwrap();

        let attention = &report.attention_time;
        assert_eq!(attention.mean_hours, Some(20.0));
        assert_eq!(attention.median_hours, Some(20.0));
        assert_eq!(attention.std_dev_hours, Some(10.0));
        assert_eq!(attention.min_hours, Some(10.0));
        assert_eq!(attention.max_hours, Some(30.0));
        assert_eq!(attention.within_threshold_pct, Some(100.0));

        assert_eq!(report.resolution_rate.rate_pct, Some(100.0));
        assert_eq!(report.resolution_rate.meets_target, Some(true));
        assert!(report.wait_time.insufficient_data);
        assert_eq!(report.category_demand.mode_category.as_deref(), Some("Agua"));
    }

    #[test]
    fn empty_dataset_reports_insufficient_data() {
        let report = engine().calculate(&CanonicalDataset::default(), at(1, 0)).unwrap();

        assert!(report.has_insufficient_data());
        assert_eq!(report.attention_time.mean_hours, None);
        assert_eq!(report.resolution_rate.rate_pct, None);
        assert_eq!(report.resolution_rate.meets_target, None);
        assert_eq!(report.category_demand.mode_category, None);
        assert!(report.temporal_trends.insufficient_data);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["attention_time"]["mean_hours"].is_null());
    }

    #[test]
    fn all_pending_dataset_has_wait_times_but_no_attention_time() {
        let dataset = CanonicalDataset::new(vec![
            pending("1", "Agua", at(1, 0)),
            pending("2", "Agua", at(2, 0)),
        ]);
        let report = engine().calculate(&dataset, at(3, 0)).unwrap();

        assert!(report.attention_time.insufficient_data);
        assert_eq!(report.resolution_rate.rate_pct, Some(0.0));
        assert_eq!(report.resolution_rate.meets_target, Some(false));
        assert_eq!(report.wait_time.pending_count, 2);
        assert_eq!(report.wait_time.mean_wait_hours, Some(36.0));
        assert_eq!(report.wait_time.max_wait_hours, Some(48.0));
    }

    #[test]
    fn unknown_status_counts_against_the_rate() {
        let mut unknown = pending("3", "Agua", at(1, 0));
        unknown.status = RequestStatus::Unknown;
        let dataset = CanonicalDataset::new(vec![
            resolved(SourceKind::Solicitudes, "1", "Agua", 5.0),
            pending("2", "Agua", at(1, 0)),
            unknown,
            resolved(SourceKind::Solicitudes, "4", "Agua", 60.0),
        ]);
        let report = engine().calculate(&dataset, at(2, 0)).unwrap();

        let rate = &report.resolution_rate;
        assert_eq!((rate.resolved, rate.pending, rate.unknown), (2, 1, 1));
        assert_eq!(rate.rate_pct, Some(50.0));
        assert_eq!(report.attention_time.within_threshold_pct, Some(50.0));
        assert_eq!(report.wait_time.pending_count, 1);
    }

    #[test]
    fn mode_category_ties_break_lexically() {
        let dataset = CanonicalDataset::new(vec![
            pending("1", "Parques", at(1, 0)),
            pending("2", "Alumbrado", at(1, 0)),
            pending("3", "Parques", at(1, 0)),
            pending("4", "Alumbrado", at(1, 0)),
            pending("5", "Agua", at(1, 0)),
        ]);
        let demand = engine().calculate(&dataset, at(2, 0)).unwrap().category_demand;

        assert_eq!(demand.mode_category.as_deref(), Some("Alumbrado"));
        assert_eq!(demand.category_count, 3);
        let order: Vec<_> = demand.distribution.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(order, ["Alumbrado", "Parques", "Agua"]);
        assert_eq!(demand.distribution[2].pct, 20.0);
    }

    #[test]
    fn temporal_trends_bucket_by_calendar_fields() {
        // 2024-01-01 was a Monday.
        let dataset = CanonicalDataset::new(vec![
            pending("1", "Agua", at(1, 9)),
            pending("2", "Agua", at(1, 9)),
            pending("3", "Agua", at(6, 23)),
            pending("4", "Agua", Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()),
        ]);
        let trends = engine().calculate(&dataset, at(10, 0)).unwrap().temporal_trends;

        assert_eq!(trends.by_day_of_week, [2, 0, 0, 0, 0, 1, 1]);
        assert_eq!(trends.by_hour[9], 2);
        assert_eq!(trends.by_hour[23], 1);
        assert_eq!(trends.by_month.get(&1), Some(&3));
        assert_eq!(trends.by_month.get(&12), Some(&1));
        assert_eq!(trends.by_year.get(&2023), Some(&1));
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let engine = KpiEngine::new(KpiSettings {
            attention_threshold_hours: 0.0,
            ..KpiSettings::default()
        });
        let err = engine.calculate(&CanonicalDataset::default(), at(1, 0)).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter(_)));
    }

    fn arb_status() -> impl Strategy<Value = RequestStatus> {
        prop_oneof![
            Just(RequestStatus::Resolved),
            Just(RequestStatus::Pending),
            Just(RequestStatus::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn resolution_rate_stays_within_bounds(statuses in prop::collection::vec(arb_status(), 1..60)) {
            let records = statuses
                .iter()
                .enumerate()
                .map(|(i, status)| {
                    let mut record = pending(&i.to_string(), "Agua", at(1, 0));
                    record.status = *status;
                    record
                })
                .collect();
            let report = engine().calculate(&CanonicalDataset::new(records), at(2, 0)).unwrap();
            let rate = report.resolution_rate.rate_pct.unwrap();
            prop_assert!((0.0..=100.0).contains(&rate));
            if statuses.iter().all(|s| *s == RequestStatus::Resolved) {
                prop_assert_eq!(rate, 100.0);
            }
        }
    }
}
