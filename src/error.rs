//! Error types for request classification.

use thiserror::Error;

/// Main error type for Keyclass operations.
#[derive(Error, Debug)]
pub enum KeyclassError {
    /// Invalid construction arguments. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A live request could not be classified (e.g. geolocation failure).
    ///
    /// This is never the same thing as an unlimited decision: the caller
    /// decides whether to fail the request, fail open, or retry.
    #[error("Classification error: {0}")]
    Classification(String),

    /// Errors reported by a counter backend
    #[error("Counter error: {0}")]
    Counter(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Keyclass operations.
pub type Result<T> = std::result::Result<T, KeyclassError>;
