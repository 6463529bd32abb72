//! Error types for batchdb.

use std::io;
use thiserror::Error;

/// Result type alias for batchdb operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for write-batch operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error surfaced by a collaborator (snapshot reads may touch storage).
    #[error("I/O error: {0}")]
    Io(String),

    /// Data corruption detected in a batch buffer.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// An argument referenced something that does not exist, such as an
    /// unknown column family under strict application.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    /// Check if this error indicates corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    /// Check if this error indicates a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
