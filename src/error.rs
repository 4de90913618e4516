//! Error types for Rastreo
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Rastreo error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment, run or artifact does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Artifact URI is not of the form `runs:/{run_id}/{path}`
    #[error("Invalid artifact URI: {0}\nExpected format: runs:/<run_id>/<artifact_path>")]
    InvalidArtifactUri(String),

    /// Run search filter or order-by clause could not be parsed
    #[error("Search parse error: {0}")]
    ParseError(String),

    /// Tracking store or dataset storage error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow/Parquet error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error reports a missing experiment, run or artifact.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
