use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

use crate::error::ForecastError;

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Residual sum of squares under which further stages cannot improve the fit.
const CONVERGED_SSE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParameters {
    pub n_stages: usize,
    /// Shrinkage applied to every stage's contribution.
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl BoostingParameters {
    fn tree_parameters(&self) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(self.max_depth)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(self.min_samples_split)
    }
}

/// Gradient-boosted regression trees under squared loss.
///
/// Starts from the mean of the target; every stage is a shallow tree fitted to the
/// current residuals and added with weight `learning_rate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn fit(
        x: &DenseMatrix<f64>,
        y: &[f64],
        parameters: &BoostingParameters,
    ) -> Result<Self, ForecastError> {
        if y.is_empty() || x.shape().0 != y.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "boosting needs one target per row, got {} rows and {} targets",
                x.shape().0,
                y.len()
            )));
        }
        if !(parameters.learning_rate > 0.0 && parameters.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning rate must be within (0, 1], got {}",
                parameters.learning_rate
            )));
        }

        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut fitted = vec![init; y.len()];
        let mut stages = Vec::with_capacity(parameters.n_stages);
        let tree_parameters = parameters.tree_parameters();

        for stage in 0..parameters.n_stages {
            let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(t, f)| t - f).collect();
            let sse: f64 = residuals.iter().map(|r| r * r).sum();
            if sse < CONVERGED_SSE {
                tracing::debug!(stage, "boosting converged early");
                break;
            }

            let tree = RegressionTree::fit(x, &residuals, tree_parameters.clone())?;
            let update = tree.predict(x)?;
            for (f, u) in fitted.iter_mut().zip(&update) {
                *f += parameters.learning_rate * u;
            }
            stages.push(tree);
        }

        tracing::debug!(stages = stages.len(), init, "gradient boosting fitted");
        Ok(Self {
            init,
            learning_rate: parameters.learning_rate,
            stages,
        })
    }

    pub fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, ForecastError> {
        let mut predictions = vec![self.init; x.shape().0];
        for tree in &self.stages {
            let update = tree.predict(x)?;
            for (p, u) in predictions.iter_mut().zip(&update) {
                *p += self.learning_rate * u;
            }
        }
        Ok(predictions)
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}
