//! Error types for the registry-search crate.
//!
//! Only [`SearchError::Validation`] ever escapes a run. Every other variant is
//! produced inside a single strategy or a single detail fetch and is absorbed
//! into the run metrics or the record it belongs to.

/// Errors that can occur while building parameters or driving a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request is missing a mandatory value (e.g. the product term).
    #[error("validation error: {0}")]
    Validation(String),

    /// No candidate selector resolved for a mandatory control.
    #[error("locator not found: {0}")]
    LocatorNotFound(String),

    /// Loading a page failed.
    #[error("navigation error: {0}")]
    Navigation(String),

    /// A page or control did not respond in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A page, selector or pattern could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid run or driver configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The record/report sink rejected an emission.
    #[error("sink error: {0}")]
    Sink(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for registry-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
