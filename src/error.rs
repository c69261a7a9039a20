//! Error types for pa-flux

use chrono::NaiveDateTime;
use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Input too short for an algorithm that cannot degrade gracefully.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Rejected before any processing starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeline mismatch (counts start {counts_start}, enmo start {enmo_start}): {detail}")]
    TimelineMismatch {
        counts_start: NaiveDateTime,
        enmo_start: NaiveDateTime,
        detail: String,
    },

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
