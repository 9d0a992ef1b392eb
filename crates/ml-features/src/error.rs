use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    /// Raised only by the checked encoding path; the regular path degrades to the
    /// unknown code instead.
    #[error("label '{label}' was not seen when fitting the '{field}' encoder")]
    UnknownCategory { field: String, label: String },

    #[error("cannot fit encoders on an empty dataset")]
    EmptyDataset,

    #[error("feature frame error: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("feature matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
