//! Error types for the anvisa-scout host application.

use registry_search::SearchError;

/// Top-level error type for the host application.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// Failure reported by the search pipeline.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Configuration file could not be parsed, serialized or validated.
    #[error("config error: {0}")]
    Config(String),

    /// Output file could not be opened or written.
    #[error("output error: {0}")]
    Output(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for the host application.
pub type Result<T> = std::result::Result<T, ScoutError>;
