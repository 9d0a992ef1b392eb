//! # Civitas Ensemble Forecaster
//!
//! Trains a random forest and a gradient-boosted tree ensemble on the features of the
//! consolidated dataset and averages their predictions.
//!
//! The lifecycle is enforced by types: an [`EnsembleForecaster`] only holds
//! parameters; `train` returns a [`TrainedEnsemble`], which is the only thing that can
//! predict. Trained ensembles are persisted with bincode through a [`ModelStore`].

pub mod boosting;
pub mod ensemble;
pub mod error;
pub mod forecaster;
mod matrix;
pub mod metrics;
pub mod prediction;
pub mod report;
pub mod store;

#[cfg(test)]
mod testing;

pub use boosting::{BoostingParameters, GradientBoostedTrees};
pub use ensemble::{HistorySnapshot, ModelMetadata, TrainedEnsemble};
pub use error::ForecastError;
pub use forecaster::EnsembleForecaster;
pub use metrics::{FeatureImportance, RegressionMetrics};
pub use prediction::{CategorySummary, PredictionRow, PredictionTable};
pub use report::EvaluationReport;
pub use store::ModelStore;
