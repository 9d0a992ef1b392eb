use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Unparseable timestamp for {field}: '{value}'")]
    UnparseableTimestamp { field: String, value: String },

    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },
}
