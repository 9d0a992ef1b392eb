use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

use crate::error::FeatureError;
use crate::vector::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};

/// Row-major matrix in [`FEATURE_NAMES`] column order, as the regressors consume it.
pub fn to_matrix(vectors: &[FeatureVector]) -> Result<Array2<f64>, FeatureError> {
    let flat: Vec<f64> = vectors.iter().flat_map(|v| v.to_row()).collect();
    Ok(Array2::from_shape_vec((vectors.len(), FEATURE_COUNT), flat)?)
}

/// Builds a DataFrame with one `f64` column per feature, plus an optional target column.
pub fn to_frame(
    vectors: &[FeatureVector],
    target: Option<(&str, &[f64])>,
) -> Result<DataFrame, FeatureError> {
    let rows: Vec<[f64; FEATURE_COUNT]> = vectors.iter().map(FeatureVector::to_row).collect();
    let mut columns: Vec<Series> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(col, name)| Series::new(*name, rows.iter().map(|row| row[col]).collect::<Vec<f64>>()))
        .collect();
    if let Some((name, values)) = target {
        columns.push(Series::new(name, values.to_vec()));
    }
    Ok(DataFrame::new(columns)?)
}

/// Converts the feature columns of a frame produced by [`to_frame`] back to a matrix.
pub fn frame_to_matrix(frame: &DataFrame) -> Result<Array2<f64>, FeatureError> {
    Ok(frame
        .select(FEATURE_NAMES)?
        .to_ndarray::<Float64Type>(IndexOrder::C)?)
}

pub fn write_parquet(frame: &mut DataFrame, path: &Path) -> Result<(), FeatureError> {
    let io_err = |source| FeatureError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let mut file = File::create(path).map_err(io_err)?;
    ParquetWriter::new(&mut file).finish(frame)?;
    tracing::info!(path = %path.display(), shape = ?frame.shape(), "feature frame written");
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<DataFrame, FeatureError> {
    let file = File::open(path).map_err(|source| FeatureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ParquetReader::new(file).finish()?)
}
