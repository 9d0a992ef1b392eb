use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A comprehensive, standardized report of service-level KPIs.
///
/// This struct is the final output of the `KpiEngine`. Undefined values (a mean over
/// zero records, for example) are `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    pub computed_at: DateTime<Utc>,
    pub total_records: usize,
    pub attention_time: AttentionTimeKpi,
    pub resolution_rate: ResolutionRateKpi,
    pub wait_time: WaitTimeKpi,
    pub category_demand: CategoryDemandKpi,
    pub temporal_trends: TemporalTrendsKpi,
}

impl KpiReport {
    /// True when any KPI family could not be computed from the data.
    pub fn has_insufficient_data(&self) -> bool {
        self.attention_time.insufficient_data
            || self.resolution_rate.insufficient_data
            || self.wait_time.insufficient_data
            || self.category_demand.insufficient_data
            || self.temporal_trends.insufficient_data
    }
}

/// Attention time over resolved records that carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionTimeKpi {
    pub sample_size: usize,
    pub mean_hours: Option<f64>,
    pub median_hours: Option<f64>,
    /// Sample standard deviation; needs at least two samples.
    pub std_dev_hours: Option<f64>,
    pub min_hours: Option<f64>,
    pub max_hours: Option<f64>,
    pub threshold_hours: f64,
    pub within_threshold_pct: Option<f64>,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRateKpi {
    pub total: usize,
    pub resolved: usize,
    pub pending: usize,
    pub unknown: usize,
    pub rate_pct: Option<f64>,
    pub target_pct: f64,
    pub meets_target: Option<bool>,
    pub insufficient_data: bool,
}

/// How long pending requests have been waiting as of the report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitTimeKpi {
    pub pending_count: usize,
    pub mean_wait_hours: Option<f64>,
    pub max_wait_hours: Option<f64>,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDemandKpi {
    pub category_count: usize,
    /// Most requested first; equal counts in lexical order.
    pub distribution: Vec<CategoryShare>,
    pub mode_category: Option<String>,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalTrendsKpi {
    /// Monday first.
    pub by_day_of_week: [usize; 7],
    pub by_hour: [usize; 24],
    /// Keyed by month number, 1 to 12.
    pub by_month: BTreeMap<u32, usize>,
    pub by_year: BTreeMap<i32, usize>,
    pub insufficient_data: bool,
}
