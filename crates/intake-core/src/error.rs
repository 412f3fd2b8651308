//! Error types for the intake system
//!
//! This module defines all error types used throughout the crate.
//!
//! Validation failures and duplicate records are not errors: the session
//! re-prompts on the former and the store reports the latter as an
//! [`AppendOutcome`](crate::traits::AppendOutcome).

use thiserror::Error;

/// Result type alias for intake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the intake system
#[derive(Error, Debug)]
pub enum Error {
    /// Messaging transport errors (send/receive)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Record store errors (read, parse, write)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The storage medium is held exclusively by another process
    #[error("Storage medium is locked: {medium}")]
    StorageLocked {
        /// Display name of the locked medium (e.g. the file name)
        medium: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a storage-locked error
    pub fn storage_locked(medium: impl Into<String>) -> Self {
        Self::StorageLocked {
            medium: medium.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error means the store could not be read or written
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::StorageLocked { .. } | Self::Io(_) | Self::Json(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
