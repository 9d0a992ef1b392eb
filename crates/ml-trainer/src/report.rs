use chrono::{DateTime, Utc};
use configuration::{ForecastTarget, Hyperparameters};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::ForecastError;
use crate::metrics::{FeatureImportance, RegressionMetrics};

/// Held-out evaluation of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub target: ForecastTarget,
    pub train_samples: usize,
    pub test_samples: usize,
    pub hyperparameters: Hyperparameters,
    pub random_forest: RegressionMetrics,
    pub gradient_boosting: RegressionMetrics,
    pub ensemble: RegressionMetrics,
    pub feature_importance: Vec<FeatureImportance>,
}

impl EvaluationReport {
    pub fn write_json(&self, path: &Path) -> Result<(), ForecastError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ForecastError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| ForecastError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
