use chrono::{DateTime, Duration, TimeZone, Utc};
use core_types::{CanonicalDataset, CanonicalRecord, RequestStatus, SourceKind};
use ml_features::{
    FEATURE_COUNT, FeatureBuilder, daily_demand, frame_to_matrix, read_parquet, to_frame,
    to_matrix, write_parquet,
};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn record(id: usize, category: &str, at: DateTime<Utc>) -> CanonicalRecord {
    CanonicalRecord {
        request_id: format!("seguimiento-{id}"),
        source: SourceKind::Seguimiento,
        native_id: id.to_string(),
        requested_at: at,
        resolved_at: Some(at + Duration::hours(5)),
        category: category.to_string(),
        status: RequestStatus::Resolved,
        attention_hours: Some(5.0),
    }
}

fn dataset_from(offsets: &[(u8, u32)]) -> CanonicalDataset {
    let categories = ["Agua", "Baches", "Parques"];
    CanonicalDataset::new(
        offsets
            .iter()
            .enumerate()
            .map(|(i, (cat, minutes))| {
                record(
                    i,
                    categories[*cat as usize % categories.len()],
                    base() + Duration::minutes(*minutes as i64),
                )
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn rolling_counts_never_look_at_the_present_or_future(
        offsets in prop::collection::vec((0u8..3, 0u32..(60 * 24 * 40)), 1..80)
    ) {
        let dataset = dataset_from(&offsets);
        let features = FeatureBuilder::fit(&dataset).unwrap().build(&dataset);
        prop_assert_eq!(features.len(), dataset.len());

        for (record, vector) in dataset.iter().zip(&features) {
            let earlier = |days: i64| {
                dataset
                    .iter()
                    .filter(|other| other.category == record.category)
                    .filter(|other| other.requested_at < record.requested_at)
                    .filter(|other| other.requested_at >= record.requested_at - Duration::days(days))
                    .count()
            };
            prop_assert_eq!(vector.rolling_count_7d, earlier(7));
            prop_assert_eq!(vector.rolling_count_14d, earlier(14));
            prop_assert_eq!(vector.rolling_count_30d, earlier(30));
            prop_assert!(vector.rolling_count_7d <= vector.rolling_count_14d);
            prop_assert!(vector.rolling_count_14d <= vector.rolling_count_30d);
        }
    }
}

#[test]
fn frame_and_matrix_agree_after_a_parquet_round_trip() {
    let dataset = dataset_from(&[(0, 0), (1, 90), (0, 3_000), (2, 7_000), (0, 9_000)]);
    let features = FeatureBuilder::fit(&dataset).unwrap().build(&dataset);
    let target: Vec<f64> = dataset.iter().filter_map(|r| r.attention_hours).collect();

    let matrix = to_matrix(&features).unwrap();
    assert_eq!(matrix.dim(), (5, FEATURE_COUNT));

    let mut frame = to_frame(&features, Some(("attention_hours", target.as_slice()))).unwrap();
    assert_eq!(frame.shape(), (5, FEATURE_COUNT + 1));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features").join("features.parquet");
    write_parquet(&mut frame, &path).unwrap();
    let restored = read_parquet(&path).unwrap();

    assert_eq!(frame_to_matrix(&restored).unwrap(), matrix);
}

#[test]
fn daily_demand_groups_by_day_and_category() {
    let dataset = dataset_from(&[(0, 10), (0, 600), (1, 700), (0, 60 * 24 + 5)]);
    let buckets = daily_demand(&dataset);

    let summary: Vec<_> = buckets
        .iter()
        .map(|b| (b.day.to_string(), b.category.as_str(), b.count))
        .collect();
    assert_eq!(
        summary,
        [
            ("2024-01-01".to_string(), "Agua", 2),
            ("2024-01-01".to_string(), "Baches", 1),
            ("2024-01-02".to_string(), "Agua", 1),
        ]
    );
    assert_eq!(buckets[2].midnight(), base() + Duration::days(1));
}
