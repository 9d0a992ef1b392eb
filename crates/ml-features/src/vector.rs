use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Column order of every feature matrix. Changing it invalidates stored models.
pub const FEATURE_NAMES: [&str; 14] = [
    "year",
    "month",
    "day",
    "day_of_week",
    "hour",
    "quarter",
    "day_of_year",
    "week_of_year",
    "rolling_count_7d",
    "rolling_count_14d",
    "rolling_count_30d",
    "category_code",
    "status_code",
    "source_code",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// The ordered list of feature names a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// The schema this build of the feature builder produces.
    pub fn current() -> Self {
        Self::from_names(FEATURE_NAMES)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Model inputs for one request, or for one (day, category) demand bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Monday is 0.
    pub day_of_week: u32,
    pub hour: u32,
    pub quarter: u32,
    pub day_of_year: u32,
    /// ISO 8601 week number.
    pub week_of_year: u32,
    pub rolling_count_7d: usize,
    pub rolling_count_14d: usize,
    pub rolling_count_30d: usize,
    pub category_code: i64,
    pub status_code: i64,
    pub source_code: i64,
}

/// Calendar part of a feature vector.
pub(crate) struct TemporalParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub day_of_week: u32,
    pub hour: u32,
    pub quarter: u32,
    pub day_of_year: u32,
    pub week_of_year: u32,
}

impl TemporalParts {
    pub(crate) fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            day: at.day(),
            day_of_week: at.weekday().num_days_from_monday(),
            hour: at.hour(),
            quarter: (at.month() - 1) / 3 + 1,
            day_of_year: at.ordinal(),
            week_of_year: at.iso_week().week(),
        }
    }
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            self.year as f64,
            self.month as f64,
            self.day as f64,
            self.day_of_week as f64,
            self.hour as f64,
            self.quarter as f64,
            self.day_of_year as f64,
            self.week_of_year as f64,
            self.rolling_count_7d as f64,
            self.rolling_count_14d as f64,
            self.rolling_count_30d as f64,
            self.category_code as f64,
            self.status_code as f64,
            self.source_code as f64,
        ]
    }
}
