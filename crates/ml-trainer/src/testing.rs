use chrono::{Duration, TimeZone, Utc};
use configuration::{Hyperparameters, ModelSettings};
use core_types::{CanonicalDataset, CanonicalRecord, RequestStatus, SourceKind};

pub(crate) const CATEGORIES: [&str; 3] = ["Agua", "Alumbrado", "Baches"];

/// Resolved requests over `days` days: one to three per category per day, with
/// attention times that depend on the category and the weekday.
pub(crate) fn synthetic_dataset(days: i64) -> CanonicalDataset {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut records = Vec::new();
    for day in 0..days {
        for (c, category) in CATEGORIES.iter().enumerate() {
            let per_day = 1 + (day as usize + c) % 3;
            for k in 0..per_day {
                let id = records.len();
                let source = SourceKind::ALL[id % 3];
                let requested_at = start + Duration::days(day) + Duration::hours(8 + 2 * k as i64);
                let hours = 6.0 * (c as f64 + 1.0) + (day % 7) as f64 + k as f64;
                records.push(CanonicalRecord {
                    request_id: CanonicalRecord::canonical_id(source, &id.to_string()),
                    source,
                    native_id: id.to_string(),
                    requested_at,
                    resolved_at: Some(requested_at + Duration::minutes((hours * 60.0) as i64)),
                    category: category.to_string(),
                    status: RequestStatus::Resolved,
                    attention_hours: Some(hours),
                });
            }
        }
    }
    CanonicalDataset::new(records)
}

/// Small models so tests stay fast.
pub(crate) fn small_settings() -> ModelSettings {
    ModelSettings {
        hyperparameters: Hyperparameters {
            n_trees: 8,
            max_depth: 4,
            ..Hyperparameters::default()
        },
        ..ModelSettings::default()
    }
}
