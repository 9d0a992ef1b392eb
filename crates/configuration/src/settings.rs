use core_types::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::mapping::ColumnMapping;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty `config.toml` yields a runnable setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub etl: EtlSettings,
    pub kpis: KpiSettings,
    pub model: ModelSettings,
    pub categories: CategorySettings,
    pub logging: LogSettings,
    pub sources: Sources,
}

/// Where extracts and consolidated outputs live, and how extraction is bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlSettings {
    pub raw_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
    pub reports_dir: PathBuf,
    /// Upper bound for reading a single source extract.
    pub extraction_timeout_secs: u64,
    /// Stable-sort the canonical dataset by `requested_at` after consolidation.
    pub sort_by_requested_at: bool,
}

/// Thresholds the KPI report is judged against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiSettings {
    /// Attention times at or under this many hours count as "within threshold".
    pub attention_threshold_hours: f64,
    /// Target resolution rate, in percent.
    pub resolution_target_pct: f64,
}

/// What the forecaster predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ForecastTarget {
    /// Hours from request to resolution, one sample per resolved request.
    AttentionHours,
    /// Requests per (day, category) bucket.
    RequestCount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub models_dir: PathBuf,
    pub target: ForecastTarget,
    /// Only requests this many days before the latest request are used for training.
    pub training_window_days: u32,
    pub horizon_days: u32,
    pub test_fraction: f64,
    pub min_training_records: usize,
    pub hyperparameters: Hyperparameters,
}

/// Parameters shared by both regressors of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub n_trees: usize,
    pub max_depth: u16,
    /// Shrinkage applied to every boosting stage.
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub random_seed: u64,
}

/// Standardization of free-form category labels across sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySettings {
    /// Alias (matched case-insensitively) to canonical category label.
    pub aliases: BTreeMap<String, String>,
    /// Label given to records whose source provides no category.
    pub default_category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Directory for the daily-rolling log file. No file logging when absent.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

/// A configured source system: its extract location and column mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// CSV extract to read. Defaults to `<raw_data_dir>/<source-code>.csv`.
    #[serde(default)]
    pub extract_path: Option<PathBuf>,
    /// Overrides the built-in mapping table for this source.
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sources(pub Vec<SourceSettings>);

impl SourceSettings {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            extract_path: None,
            mapping: None,
        }
    }

    pub fn mapping(&self) -> ColumnMapping {
        self.mapping
            .clone()
            .unwrap_or_else(|| ColumnMapping::default_for(self.kind))
    }

    pub fn extract_path(&self, etl: &EtlSettings) -> PathBuf {
        self.extract_path
            .clone()
            .unwrap_or_else(|| etl.raw_data_dir.join(format!("{}.csv", self.kind.code())))
    }
}

impl Settings {
    /// Checks the cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.kpis.attention_threshold_hours <= 0.0 {
            return fail(format!(
                "kpis.attention_threshold_hours must be positive, got {}",
                self.kpis.attention_threshold_hours
            ));
        }
        if !(0.0..=100.0).contains(&self.kpis.resolution_target_pct) {
            return fail(format!(
                "kpis.resolution_target_pct must be within [0, 100], got {}",
                self.kpis.resolution_target_pct
            ));
        }

        let model = &self.model;
        if !(model.test_fraction > 0.0 && model.test_fraction < 1.0) {
            return fail(format!(
                "model.test_fraction must be within (0, 1), got {}",
                model.test_fraction
            ));
        }
        if model.horizon_days == 0 || model.training_window_days == 0 {
            return fail("model.horizon_days and model.training_window_days must be positive".into());
        }
        if model.min_training_records < 2 {
            return fail(format!(
                "model.min_training_records must be at least 2, got {}",
                model.min_training_records
            ));
        }

        let hp = &model.hyperparameters;
        if hp.n_trees == 0 || hp.max_depth == 0 {
            return fail("model.hyperparameters n_trees and max_depth must be positive".into());
        }
        if !(hp.learning_rate > 0.0 && hp.learning_rate <= 1.0) {
            return fail(format!(
                "model.hyperparameters.learning_rate must be within (0, 1], got {}",
                hp.learning_rate
            ));
        }

        if self.etl.extraction_timeout_secs == 0 {
            return fail("etl.extraction_timeout_secs must be positive".into());
        }

        if self.sources.0.is_empty() {
            return fail("at least one source must be configured".into());
        }
        let mut seen = HashSet::new();
        for source in &self.sources.0 {
            if !seen.insert(source.kind) {
                return fail(format!("source '{}' is configured more than once", source.kind));
            }
            let mapping = source.mapping();
            if mapping.request_id.trim().is_empty() || mapping.requested_at.trim().is_empty() {
                return fail(format!(
                    "source '{}' must map request_id and requested_at to a column",
                    source.kind
                ));
            }
        }

        Ok(())
    }
}

// --- Default Implementations ---

impl Default for EtlSettings {
    fn default() -> Self {
        Self {
            raw_data_dir: PathBuf::from("data/raw"),
            processed_data_dir: PathBuf::from("data/processed"),
            reports_dir: PathBuf::from("reports/generated"),
            extraction_timeout_secs: 60,
            sort_by_requested_at: false,
        }
    }
}

impl Default for KpiSettings {
    fn default() -> Self {
        Self {
            attention_threshold_hours: 48.0,
            resolution_target_pct: 85.0,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            target: ForecastTarget::AttentionHours,
            training_window_days: 180,
            horizon_days: 30,
            test_fraction: 0.2,
            min_training_records: 100,
            hyperparameters: Hyperparameters::default(),
        }
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            learning_rate: 0.1,
            min_samples_leaf: 1,
            min_samples_split: 2,
            random_seed: 42,
        }
    }
}

impl Default for CategorySettings {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            default_category: "Uncategorized".to_string(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: Some(PathBuf::from("logs")),
            file_prefix: "civitas.log".to_string(),
        }
    }
}

impl Default for Sources {
    fn default() -> Self {
        Sources(SourceKind::ALL.into_iter().map(SourceSettings::new).collect())
    }
}
