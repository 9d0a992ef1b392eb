use chrono::NaiveDate;
use configuration::ForecastTarget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ForecastError;

/// One forecast for one (day, category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub date: NaiveDate,
    pub category: String,
    /// Mean of the two regressors.
    #[serde(rename = "predicted_attention_time")]
    pub predicted: f64,
    #[serde(rename = "prediction_random_forest")]
    pub random_forest: f64,
    #[serde(rename = "prediction_gradient_boosting")]
    pub gradient_boosting: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub days: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single day.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// The predictions of one `predict` call, day-major then category order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTable {
    pub target: ForecastTarget,
    pub rows: Vec<PredictionRow>,
}

impl PredictionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean, spread and range of the ensemble prediction per category.
    pub fn summary_by_category(&self) -> Vec<CategorySummary> {
        let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.category.as_str()).or_default().push(row.predicted);
        }

        groups
            .into_iter()
            .map(|(category, values)| {
                let n = values.len();
                let mean = values.iter().sum::<f64>() / n as f64;
                let std = (n > 1).then(|| {
                    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
                });
                CategorySummary {
                    category: category.to_string(),
                    days: n,
                    mean,
                    std,
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect()
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ForecastError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ForecastError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|source| ForecastError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "predictions written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, category: &str, predicted: f64) -> PredictionRow {
        PredictionRow {
            date: NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
            category: category.to_string(),
            predicted,
            random_forest: predicted - 1.0,
            gradient_boosting: predicted + 1.0,
        }
    }

    #[test]
    fn summary_groups_by_category() {
        let table = PredictionTable {
            target: ForecastTarget::AttentionHours,
            rows: vec![row(1, "Agua", 10.0), row(1, "Baches", 3.0), row(2, "Agua", 14.0)],
        };
        let summary = table.summary_by_category();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].category, "Agua");
        assert_eq!(summary[0].mean, 12.0);
        assert_eq!(summary[0].min, 10.0);
        assert_eq!(summary[0].max, 14.0);
        assert!((summary[0].std.unwrap() - 8f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary[1].std, None);
    }

    #[test]
    fn csv_uses_the_published_column_names() {
        let table = PredictionTable {
            target: ForecastTarget::AttentionHours,
            rows: vec![row(1, "Agua", 10.0)],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        table.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "date,category,predicted_attention_time,prediction_random_forest,prediction_gradient_boosting"
        );
        assert!(text.contains("2024-07-01,Agua,10.0,9.0,11.0"));
    }
}
