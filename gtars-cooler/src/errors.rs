use std::io;
use thiserror::Error;

/// Error type for cooler range queries and container I/O.
#[derive(Error, Debug)]
pub enum CoolerError {
    /// Unknown chromosome, column, or table.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Start after end, region outside its chromosome, or an otherwise malformed range.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Balancing was requested but the bin table has no `weight` column.
    #[error(
        "No column 'bins/weight' found. Compute balancing weights first or disable balancing"
    )]
    MissingWeights,

    /// The container contradicts its own schema or indexes.
    #[error("Malformed storage: {0}")]
    MalformedStorage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for gtars-cooler operations.
pub type Result<T> = std::result::Result<T, CoolerError>;
