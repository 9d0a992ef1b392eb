use chrono::{Duration, Utc};
use configuration::{ForecastTarget, Hyperparameters, ModelSettings};
use core_types::CanonicalDataset;
use ml_features::{
    FEATURE_COUNT, FEATURE_NAMES, FeatureBuilder, FeatureSchema, FeatureVector,
    ROLLING_WINDOWS_DAYS, RollingHistory, daily_demand, midnight, to_matrix,
};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressorParameters;
use smartcore::model_selection::train_test_split;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::boosting::{BoostingParameters, GradientBoostedTrees};
use crate::ensemble::{
    Forest, HistorySnapshot, ModelMetadata, PROJECTED_SOURCE, TrainedEnsemble, projected_status,
};
use crate::error::ForecastError;
use crate::matrix::{dense_from_array, dense_from_rows, to_rows};
use crate::metrics::{RegressionMetrics, average, permutation_importance};
use crate::report::EvaluationReport;

/// Feature vectors and targets ready for fitting.
struct TrainingSet {
    builder: FeatureBuilder,
    history: RollingHistory,
    vectors: Vec<FeatureVector>,
    targets: Vec<f64>,
}

/// Holds training parameters. The only way to get a model that predicts is
/// [`EnsembleForecaster::train`].
#[derive(Debug, Clone)]
pub struct EnsembleForecaster {
    settings: ModelSettings,
}

impl EnsembleForecaster {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Fits both regressors on the training split and evaluates them on the held-out
    /// split. The input dataset is only read.
    pub fn train(
        &self,
        dataset: &CanonicalDataset,
        target: ForecastTarget,
        test_fraction: f64,
    ) -> Result<(TrainedEnsemble, EvaluationReport), ForecastError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "test fraction must be within (0, 1), got {test_fraction}"
            )));
        }
        let hp = &self.settings.hyperparameters;
        if hp.n_trees == 0 {
            return Err(ForecastError::InvalidParameter("n_trees must be at least 1".into()));
        }

        let window = self.training_window(dataset);
        let training = self.training_set(&window, target)?;
        tracing::info!(
            ?target,
            window_records = window.len(),
            samples = training.targets.len(),
            "training ensemble"
        );

        let x = dense_from_array(&to_matrix(&training.vectors)?)?;
        let (x_train, x_test, y_train, y_test) = train_test_split(
            &x,
            &training.targets,
            test_fraction as f32,
            true,
            Some(hp.random_seed),
        );

        let forest = Forest::fit(&x_train, &y_train, forest_parameters(hp))?;
        let boosted = GradientBoostedTrees::fit(&x_train, &y_train, &boosting_parameters(hp))?;

        let test_rows = to_rows(&x_test);
        let (rf_metrics, gb_metrics, ensemble_metrics, feature_importance) = if test_rows.is_empty() {
            let undefined = RegressionMetrics::evaluate(&[], &[]);
            (undefined, undefined, undefined, Vec::new())
        } else {
            let rf_pred = forest.predict(&x_test)?;
            let gb_pred = boosted.predict(&x_test)?;
            let names: Vec<String> = FEATURE_NAMES.iter().map(|n| n.to_string()).collect();
            let importance =
                permutation_importance::<_, ForecastError>(&names, &test_rows, &y_test, |rows| {
                    let x = dense_from_rows(rows, FEATURE_COUNT)?;
                    Ok(average(&forest.predict(&x)?, &boosted.predict(&x)?))
                })?;
            (
                RegressionMetrics::evaluate(&y_test, &rf_pred),
                RegressionMetrics::evaluate(&y_test, &gb_pred),
                RegressionMetrics::evaluate(&y_test, &average(&rf_pred, &gb_pred)),
                importance,
            )
        };

        let metadata = ModelMetadata {
            id: Uuid::new_v4(),
            trained_at: Utc::now(),
            target,
            hyperparameters: hp.clone(),
            train_samples: y_train.len(),
        };
        let report = EvaluationReport {
            model_id: metadata.id,
            trained_at: metadata.trained_at,
            target,
            train_samples: y_train.len(),
            test_samples: y_test.len(),
            hyperparameters: hp.clone(),
            random_forest: rf_metrics,
            gradient_boosting: gb_metrics,
            ensemble: ensemble_metrics,
            feature_importance,
        };
        tracing::info!(
            model_id = %metadata.id,
            train_samples = report.train_samples,
            test_samples = report.test_samples,
            rmse = ?report.ensemble.rmse,
            mae = ?report.ensemble.mae,
            r2 = ?report.ensemble.r2,
            "ensemble trained"
        );

        let ensemble = TrainedEnsemble {
            history: snapshot(&window, &training.history)?,
            metadata,
            schema: FeatureSchema::current(),
            encoders: training.builder.into_encoders(),
            random_forest: forest,
            gradient_boosting: boosted,
        };
        Ok((ensemble, report))
    }

    /// Records requested within `training_window_days` of the latest request.
    fn training_window(&self, dataset: &CanonicalDataset) -> CanonicalDataset {
        let Some(latest) = dataset.latest_requested_at() else {
            return CanonicalDataset::default();
        };
        let cutoff = latest - Duration::days(i64::from(self.settings.training_window_days));
        CanonicalDataset::new(
            dataset
                .iter()
                .filter(|r| r.requested_at >= cutoff)
                .cloned()
                .collect(),
        )
    }

    fn training_set(
        &self,
        window: &CanonicalDataset,
        target: ForecastTarget,
    ) -> Result<TrainingSet, ForecastError> {
        let required = self.settings.min_training_records;
        let available = match target {
            ForecastTarget::AttentionHours => window
                .iter()
                .filter(|r| r.is_resolved() && r.attention_hours.is_some())
                .count(),
            ForecastTarget::RequestCount => daily_demand(window).len(),
        };
        if available == 0 || available < required {
            return Err(ForecastError::InsufficientData {
                available,
                required,
            });
        }

        let builder = FeatureBuilder::fit(window)?;
        let history = RollingHistory::from_dataset(window);
        let (vectors, targets): (Vec<FeatureVector>, Vec<f64>) = match target {
            ForecastTarget::AttentionHours => builder
                .build(window)
                .into_iter()
                .zip(window.iter())
                .filter(|(_, r)| r.is_resolved())
                .filter_map(|(v, r)| r.attention_hours.map(|h| (v, h)))
                .unzip(),
            ForecastTarget::RequestCount => {
                let status = projected_status(target);
                daily_demand(window)
                    .into_iter()
                    .map(|bucket| {
                        let vector = builder.build_one(
                            bucket.midnight(),
                            &bucket.category,
                            status,
                            PROJECTED_SOURCE,
                            &history,
                        );
                        (vector, bucket.count as f64)
                    })
                    .unzip()
            }
        };

        Ok(TrainingSet {
            builder,
            history,
            vectors,
            targets,
        })
    }
}

fn forest_parameters(hp: &Hyperparameters) -> RandomForestRegressorParameters {
    RandomForestRegressorParameters::default()
        .with_n_trees(hp.n_trees as _)
        .with_max_depth(hp.max_depth)
        .with_min_samples_leaf(hp.min_samples_leaf)
        .with_min_samples_split(hp.min_samples_split)
        .with_seed(hp.random_seed)
}

fn boosting_parameters(hp: &Hyperparameters) -> BoostingParameters {
    BoostingParameters {
        n_stages: hp.n_trees,
        learning_rate: hp.learning_rate,
        max_depth: hp.max_depth,
        min_samples_leaf: hp.min_samples_leaf,
        min_samples_split: hp.min_samples_split,
    }
}

/// Keeps the trailing requests every forecast window can reach, and the daily rate
/// per category over that span.
fn snapshot(
    window: &CanonicalDataset,
    history: &RollingHistory,
) -> Result<HistorySnapshot, ForecastError> {
    let latest = window
        .latest_requested_at()
        .ok_or(ForecastError::InsufficientData {
            available: 0,
            required: 1,
        })?;
    let last_day = latest.date_naive();
    let span_days = ROLLING_WINDOWS_DAYS.iter().copied().max().unwrap_or(30);
    let horizon_start = midnight(last_day + Duration::days(1));
    let events = history.tail_since(horizon_start - Duration::days(span_days));

    let daily_rate: BTreeMap<String, f64> = events
        .categories()
        .map(|category| {
            let rate = events.count_in_window(category, horizon_start, span_days) as f64
                / span_days as f64;
            (category.to_string(), rate)
        })
        .collect();

    Ok(HistorySnapshot {
        events,
        last_day,
        daily_rate,
    })
}
