use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid KPI parameter: {0}")]
    InvalidParameter(String),

    #[error("Error in calculation of '{metric}': {detail}")]
    Calculation { metric: &'static str, detail: String },
}
