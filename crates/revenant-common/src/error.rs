//! Error types for Project Revenant.

use thiserror::Error;

/// Top-level error type for Revenant operations outside the per-tick path.
#[derive(Debug, Error)]
pub enum AiError {
    /// Schedule table failed validation or parsing
    #[error("Schedule table error: {0}")]
    ScheduleTable(String),

    /// Snapshot encoding or decoding failed
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },
}

/// Result type alias for Revenant operations.
pub type AiResult<T> = Result<T, AiError>;
