//! Error types for the MEWCP solver.

use thiserror::Error;

/// Errors that can occur while loading instances or running a search.
#[derive(Error, Debug)]
pub enum MewcpError {
    /// Underlying I/O failure (missing file, unwritable output, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed instance file
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Instance data is inconsistent (n % m != 0, asymmetric weights, ...)
    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    /// A selection does not pick exactly one vertex per partition
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// The relaxation oracle failed outright
    #[error("Oracle failed: {0}")]
    Oracle(String),

    /// JSON serialization of results failed
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for MEWCP operations.
pub type Result<T> = std::result::Result<T, MewcpError>;

impl MewcpError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        MewcpError::Parse {
            line,
            message: message.into(),
        }
    }
}
