//! Centralized error handling for the stockbook library.
//!
//! The registry subsystem returns the typed [`StockbookError`] so callers can
//! match on failure categories (a missing record id is routine, a torn store
//! file is not); importer internals use `anyhow` and convert at the boundary
//! via the `From<anyhow::Error>` impl.
//!
//! ```no_run
//! use stockbook::error::{Result, ResultExt as _};
//! use std::fs;
//!
//! fn load_data() -> Result<String> {
//!     let content = fs::read_to_string("items.csv").context("Failed to load store")?;
//!     Ok(content)
//! }
//! ```

use std::fmt;

/// Main error type for stockbook operations.
#[derive(Debug)]
pub enum StockbookError {
    /// I/O errors (file operations)
    Io(std::io::Error),

    /// Data processing errors (Polars, parsing)
    DataProcessing(String),

    /// Record store errors (unreadable or torn store files)
    Store(String),

    /// File not found or invalid path
    InvalidPath(String),

    /// A referenced record does not exist
    NotFound(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for StockbookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Store(msg) => write!(f, "Store error: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StockbookError {}

impl From<std::io::Error> for StockbookError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for StockbookError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<polars::error::PolarsError> for StockbookError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for stockbook operations.
pub type Result<T> = std::result::Result<T, StockbookError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<StockbookError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: StockbookError = e.into();
            StockbookError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: StockbookError = e.into();
            StockbookError::Other(format!("{}: {}", f(), err))
        })
    }
}
