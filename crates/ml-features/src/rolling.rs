use chrono::{DateTime, Duration, Utc};
use core_types::CanonicalDataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trailing window lengths, in days, of the rolling demand features.
pub const ROLLING_WINDOWS_DAYS: [i64; 3] = [7, 14, 30];

/// Request timestamps per category, kept sorted so window counts are two binary
/// searches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingHistory {
    by_category: BTreeMap<String, Vec<DateTime<Utc>>>,
}

impl RollingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: &CanonicalDataset) -> Self {
        dataset
            .iter()
            .map(|r| (r.category.clone(), r.requested_at))
            .collect()
    }

    /// Adds one event, keeping the category's timestamps sorted.
    pub fn record(&mut self, category: &str, at: DateTime<Utc>) {
        let events = self.by_category.entry(category.to_string()).or_default();
        let idx = events.partition_point(|t| *t <= at);
        events.insert(idx, at);
    }

    /// Same-category events in the half-open window `[at - days, at)`.
    pub fn count_in_window(&self, category: &str, at: DateTime<Utc>, days: i64) -> usize {
        let Some(events) = self.by_category.get(category) else {
            return 0;
        };
        let start = at - Duration::days(days);
        let lo = events.partition_point(|t| *t < start);
        let hi = events.partition_point(|t| *t < at);
        hi.saturating_sub(lo)
    }

    pub fn rolling_counts(&self, category: &str, at: DateTime<Utc>) -> [usize; 3] {
        ROLLING_WINDOWS_DAYS.map(|days| self.count_in_window(category, at, days))
    }

    /// Keeps only events at or after `cutoff`; categories are kept even when emptied.
    pub fn tail_since(&self, cutoff: DateTime<Utc>) -> Self {
        let by_category = self
            .by_category
            .iter()
            .map(|(category, events)| {
                let start = events.partition_point(|t| *t < cutoff);
                (category.clone(), events[start..].to_vec())
            })
            .collect();
        Self { by_category }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.by_category.keys().map(String::as_str)
    }

    pub fn events(&self, category: &str) -> &[DateTime<Utc>] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.by_category.values().filter_map(|events| events.last()).max().copied()
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Into<String>> FromIterator<(S, DateTime<Utc>)> for RollingHistory {
    fn from_iter<I: IntoIterator<Item = (S, DateTime<Utc>)>>(iter: I) -> Self {
        let mut by_category: BTreeMap<String, Vec<DateTime<Utc>>> = BTreeMap::new();
        for (category, at) in iter {
            by_category.entry(category.into()).or_default().push(at);
        }
        for events in by_category.values_mut() {
            events.sort();
        }
        Self { by_category }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn window_is_half_open() {
        let history: RollingHistory = [("Agua", day(1)), ("Agua", day(3)), ("Agua", day(8)), ("Baches", day(7))]
            .into_iter()
            .collect();

        // [May 1, May 8): the event exactly at May 8 is excluded, May 1 is included.
        assert_eq!(history.count_in_window("Agua", day(8), 7), 2);
        assert_eq!(history.count_in_window("Agua", day(9), 7), 2);
        assert_eq!(history.count_in_window("Agua", day(1), 7), 0);
        assert_eq!(history.count_in_window("Parques", day(9), 7), 0);
        assert_eq!(history.rolling_counts("Baches", day(20)), [0, 1, 1]);
    }

    #[test]
    fn recorded_events_stay_sorted() {
        let mut history = RollingHistory::new();
        history.record("Agua", day(5));
        history.record("Agua", day(2));
        history.record("Agua", day(9));
        assert_eq!(history.events("Agua"), [day(2), day(5), day(9)]);
        assert_eq!(history.latest(), Some(day(9)));
    }

    #[test]
    fn tail_keeps_categories_and_recent_events() {
        let history: RollingHistory = [("Agua", day(1)), ("Agua", day(20)), ("Baches", day(2))]
            .into_iter()
            .collect();
        let tail = history.tail_since(day(10));

        assert_eq!(tail.len(), 1);
        assert_eq!(tail.categories().collect::<Vec<_>>(), ["Agua", "Baches"]);
        assert!(tail.events("Baches").is_empty());
    }
}
