use serde::{Deserialize, Serialize};

/// Regression quality on a held-out split. `None` when the split is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    /// Undefined when the target is constant over the split.
    pub r2: Option<f64>,
}

impl RegressionMetrics {
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len();
        if n == 0 || n != y_pred.len() {
            return Self {
                rmse: None,
                mae: None,
                r2: None,
            };
        }

        let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
        let mae: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n as f64;

        let mean_true = y_true.iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean_true).powi(2)).sum();

        Self {
            rmse: Some((ss_res / n as f64).sqrt()),
            mae: Some(mae),
            r2: (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot),
        }
    }
}

/// Element-wise mean of the two regressors' predictions.
pub fn average(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Increase in ensemble RMSE when the feature's column is scrambled.
    pub importance: f64,
}

/// Permutation importance of every column of `rows`.
///
/// Each column in turn is rotated by one row, which breaks its link to the target
/// without changing its distribution, and the RMSE increase of `predict` is recorded.
/// Results are sorted by decreasing importance, ties by feature name.
pub fn permutation_importance<F, E>(
    feature_names: &[String],
    rows: &[Vec<f64>],
    y_true: &[f64],
    mut predict: F,
) -> Result<Vec<FeatureImportance>, E>
where
    F: FnMut(&[Vec<f64>]) -> Result<Vec<f64>, E>,
{
    let rmse = |pred: &[f64]| RegressionMetrics::evaluate(y_true, pred).rmse.unwrap_or(0.0);
    let baseline = rmse(&predict(rows)?);

    let mut importances = Vec::with_capacity(feature_names.len());
    for (col, name) in feature_names.iter().enumerate() {
        let mut scrambled = rows.to_vec();
        let n = rows.len();
        for (i, row) in scrambled.iter_mut().enumerate() {
            row[col] = rows[(i + 1) % n][col];
        }
        importances.push(FeatureImportance {
            feature: name.clone(),
            importance: rmse(&predict(&scrambled)?) - baseline,
        });
    }

    importances.sort_by(|a, b| {
        b.importance
            .total_cmp(&a.importance)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    Ok(importances)
}
