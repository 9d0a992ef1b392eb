use chrono::{DateTime, NaiveDate, Utc};
use core_types::CanonicalDataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requests received for one category on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandBucket {
    pub day: NaiveDate,
    pub category: String,
    pub count: usize,
}

impl DemandBucket {
    /// Bucket features are computed as of the start of the day.
    pub fn midnight(&self) -> DateTime<Utc> {
        midnight(self.day)
    }
}

pub fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Groups requests by (day, category). Only non-empty buckets are returned, ordered by
/// day then category.
pub fn daily_demand(dataset: &CanonicalDataset) -> Vec<DemandBucket> {
    let mut counts: BTreeMap<(NaiveDate, &str), usize> = BTreeMap::new();
    for record in dataset {
        *counts
            .entry((record.requested_at.date_naive(), record.category.as_str()))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((day, category), count)| DemandBucket {
            day,
            category: category.to_string(),
            count,
        })
        .collect()
}
