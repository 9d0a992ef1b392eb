use ndarray::Array2;
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::ForecastError;

pub(crate) fn dense_from_array(matrix: &Array2<f64>) -> Result<DenseMatrix<f64>, ForecastError> {
    let values: Vec<f64> = matrix.iter().copied().collect();
    Ok(DenseMatrix::new(matrix.nrows(), matrix.ncols(), values, false)?)
}

pub(crate) fn dense_from_rows(rows: &[Vec<f64>], ncols: usize) -> Result<DenseMatrix<f64>, ForecastError> {
    let values: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DenseMatrix::new(rows.len(), ncols, values, false)?)
}

pub(crate) fn to_rows(matrix: &DenseMatrix<f64>) -> Vec<Vec<f64>> {
    let (nrows, ncols) = matrix.shape();
    (0..nrows)
        .map(|i| (0..ncols).map(|j| *matrix.get((i, j))).collect())
        .collect()
}
