//! Error types for the rating pipeline.
//!
//! Only failures that abort a whole batch surface here. Per-student lookup
//! misses are recovered inside the pipeline and reported as unprocessed users.

use thiserror::Error;

pub type RaterResult<T> = Result<T, RaterError>;

#[derive(Error, Debug)]
pub enum RaterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data source unavailable: {0}")]
    DataSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl RaterError {
    /// True for errors that mean the data source itself could not be used.
    pub fn is_fatal_source(&self) -> bool {
        matches!(self, RaterError::Configuration(_) | RaterError::DataSource(_))
    }
}
