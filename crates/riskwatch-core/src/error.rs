//! Error types for Riskwatch.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The external estimation call failed or returned data that failed validation.
    #[error("Estimator error: {0}")]
    Estimator(String),

    /// A read or write against the storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller asked for something that cannot be computed (empty input, zero goal).
    #[error("Input error: {0}")]
    Input(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Whether this failure came from the estimator rather than from storage or input.
    pub fn is_estimator(&self) -> bool {
        matches!(self, Self::Estimator(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
