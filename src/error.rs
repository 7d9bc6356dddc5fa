//! Error types for invsync

use thiserror::Error;

/// Result type for invsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types across the import pipeline
///
/// Per-row failures are caught at row granularity by the run orchestrator and
/// counted, never aborting the run. Only pre-run setup failures (opening the
/// store, reading the input file) propagate out of `main`.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV input error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed persisted record (bad timestamp, bad JSON, ...)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
