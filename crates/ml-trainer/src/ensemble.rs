use chrono::{DateTime, Duration, NaiveDate, Utc};
use configuration::{ForecastTarget, Hyperparameters};
use core_types::{RequestStatus, SourceKind};
use ml_features::{
    EncoderSet, FeatureBuilder, FeatureSchema, FeatureVector, RollingHistory, midnight, to_matrix,
};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::boosting::GradientBoostedTrees;
use crate::error::ForecastError;
use crate::matrix::dense_from_array;
use crate::prediction::{PredictionRow, PredictionTable};

pub(crate) type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Source every synthetic request is attributed to when projecting demand.
pub(crate) const PROJECTED_SOURCE: SourceKind = SourceKind::Solicitudes;

/// Status of the synthetic request a prediction is made for.
pub(crate) fn projected_status(target: ForecastTarget) -> RequestStatus {
    match target {
        ForecastTarget::AttentionHours => RequestStatus::Resolved,
        ForecastTarget::RequestCount => RequestStatus::Pending,
    }
}

/// What prediction needs to know about the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Requests of the last 30 days of training data, enough to seed every rolling window.
    pub events: RollingHistory,
    /// Last calendar day with training data; forecasts start the day after.
    pub last_day: NaiveDate,
    /// Mean requests per day over the snapshot, per category.
    pub daily_rate: BTreeMap<String, f64>,
}

/// Version metadata of a trained ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub target: ForecastTarget,
    pub hyperparameters: Hyperparameters,
    pub train_samples: usize,
}

/// A fitted random forest and gradient-boosted ensemble, with everything needed to
/// predict: encoders, feature schema and history snapshot.
///
/// Produced only by `EnsembleForecaster::train` or loaded from a `ModelStore`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedEnsemble {
    pub(crate) metadata: ModelMetadata,
    pub(crate) schema: FeatureSchema,
    pub(crate) encoders: EncoderSet,
    pub(crate) history: HistorySnapshot,
    pub(crate) random_forest: Forest,
    pub(crate) gradient_boosting: GradientBoostedTrees,
}

impl TrainedEnsemble {
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    pub fn history(&self) -> &HistorySnapshot {
        &self.history
    }

    /// Forecasts every category seen during training for `horizon_days` days.
    pub fn predict(&self, horizon_days: u32) -> Result<PredictionTable, ForecastError> {
        let categories = self.encoders.category.classes().to_vec();
        self.predict_for_categories(horizon_days, &categories)
    }

    /// Forecasts the given categories, which need not have been seen in training.
    ///
    /// Rolling windows start from the stored history and are extended day by day with
    /// projected demand: the predicted counts for a request-count model, the historical
    /// daily rate for an attention-time model.
    pub fn predict_for_categories<S: AsRef<str>>(
        &self,
        horizon_days: u32,
        categories: &[S],
    ) -> Result<PredictionTable, ForecastError> {
        self.forecast(horizon_days, categories).map(|(table, _)| table)
    }

    /// Runs the forecast and also returns the history as extended by the projection.
    pub(crate) fn forecast<S: AsRef<str>>(
        &self,
        horizon_days: u32,
        categories: &[S],
    ) -> Result<(PredictionTable, RollingHistory), ForecastError> {
        if horizon_days == 0 {
            return Err(ForecastError::InvalidHorizon(horizon_days));
        }
        self.check_schema()?;

        let target = self.metadata.target;
        let mut history = self.history.events.clone();
        if categories.is_empty() {
            let table = PredictionTable {
                target,
                rows: Vec::new(),
            };
            return Ok((table, history));
        }
        let status = projected_status(target);
        let builder = FeatureBuilder::from_encoders(self.encoders.clone());
        let mut rows = Vec::with_capacity(horizon_days as usize * categories.len());
        // Fractional projected events carried to the next day, per category.
        let mut carry = vec![0.0f64; categories.len()];

        for offset in 1..=i64::from(horizon_days) {
            let date = self.history.last_day + Duration::days(offset);
            let at = midnight(date);

            let vectors: Vec<FeatureVector> = categories
                .iter()
                .map(|c| builder.build_one(at, c.as_ref(), status, PROJECTED_SOURCE, &history))
                .collect();
            let x = dense_from_array(&to_matrix(&vectors)?)?;
            let forest = self.random_forest.predict(&x)?;
            let boosted = self.gradient_boosting.predict(&x)?;

            for (((category, rf), gb), pending) in
                categories.iter().zip(forest).zip(boosted).zip(carry.iter_mut())
            {
                let category = category.as_ref();
                let predicted = (rf + gb) / 2.0;
                let projected = match target {
                    ForecastTarget::RequestCount => predicted,
                    ForecastTarget::AttentionHours => {
                        self.history.daily_rate.get(category).copied().unwrap_or(0.0)
                    }
                };
                *pending += projected.max(0.0);
                let whole = pending.floor();
                *pending -= whole;
                for _ in 0..whole as usize {
                    history.record(category, at);
                }
                rows.push(PredictionRow {
                    date,
                    category: category.to_string(),
                    predicted,
                    random_forest: rf,
                    gradient_boosting: gb,
                });
            }
        }

        tracing::info!(
            model_id = %self.metadata.id,
            horizon_days,
            categories = categories.len(),
            rows = rows.len(),
            "forecast generated"
        );
        Ok((PredictionTable { target, rows }, history))
    }

    fn check_schema(&self) -> Result<(), ForecastError> {
        let current = FeatureSchema::current();
        if self.schema != current {
            return Err(ForecastError::SchemaMismatch {
                expected: self.schema.names().to_vec(),
                found: current.names().to_vec(),
            });
        }
        Ok(())
    }
}
