use chrono::{Duration, TimeZone, Utc};
use configuration::{ForecastTarget, Hyperparameters, ModelSettings};
use core_types::{CanonicalDataset, CanonicalRecord, RequestStatus, SourceKind};
use ml_trainer::{EnsembleForecaster, ModelStore};

/// Two categories, one busy and slow, one quiet and fast, over ninety days.
fn city_requests() -> CanonicalDataset {
    let start = Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap();
    let mut records = Vec::new();
    for day in 0..90i64 {
        for (category, per_day, base_hours) in [("Baches", 4, 40.0), ("Parques", 1, 8.0)] {
            for k in 0..per_day {
                let id = records.len();
                let requested_at = start + Duration::days(day) + Duration::hours(9 + k);
                let pending = id % 10 == 0;
                let hours = base_hours + (day % 5) as f64;
                records.push(CanonicalRecord {
                    request_id: CanonicalRecord::canonical_id(SourceKind::AtencionCiudadana, &id.to_string()),
                    source: SourceKind::AtencionCiudadana,
                    native_id: id.to_string(),
                    requested_at,
                    resolved_at: (!pending).then(|| requested_at + Duration::hours(hours as i64)),
                    category: category.to_string(),
                    status: if pending {
                        RequestStatus::Pending
                    } else {
                        RequestStatus::Resolved
                    },
                    attention_hours: (!pending).then_some(hours),
                });
            }
        }
    }
    CanonicalDataset::new(records)
}

fn settings() -> ModelSettings {
    ModelSettings {
        hyperparameters: Hyperparameters {
            n_trees: 10,
            max_depth: 5,
            ..Hyperparameters::default()
        },
        ..ModelSettings::default()
    }
}

#[test]
fn pending_requests_are_not_attention_samples() {
    let dataset = city_requests();
    let resolved = dataset.iter().filter(|r| r.is_resolved()).count();

    let (_, report) = EnsembleForecaster::new(settings())
        .train(&dataset, ForecastTarget::AttentionHours, 0.2)
        .unwrap();
    assert_eq!(report.train_samples + report.test_samples, resolved);
}

#[test]
fn forecasts_separate_slow_and_fast_categories() {
    let (ensemble, report) = EnsembleForecaster::new(settings())
        .train(&city_requests(), ForecastTarget::AttentionHours, 0.2)
        .unwrap();
    assert!(report.ensemble.r2.unwrap() > 0.5);

    let summary = ensemble.predict(14).unwrap().summary_by_category();
    let mean_of = |name: &str| summary.iter().find(|s| s.category == name).unwrap().mean;
    assert!(mean_of("Baches") > mean_of("Parques"));
}

#[test]
fn stored_model_survives_a_reload() {
    let (ensemble, report) = EnsembleForecaster::new(settings())
        .train(&city_requests(), ForecastTarget::RequestCount, 0.2)
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    store.save(&ensemble).unwrap();

    let reloaded = store.load_latest().unwrap();
    assert_eq!(reloaded.metadata().id, report.model_id);

    let predictions = reloaded.predict(30).unwrap();
    assert_eq!(predictions, ensemble.predict(30).unwrap());
    let path = dir.path().join("predictions.csv");
    predictions.write_csv(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1 + 30 * 2);
}
