//! Error types for audio backends

use thiserror::Error;

/// Errors raised by an audio backend
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The backend failed to carry out a request
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend does not implement the requested operation
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// The backend has been shut down or lost its device
    #[error("Backend disconnected")]
    Disconnected,
}

impl PlayerError {
    /// Shorthand for a backend failure with a message
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, PlayerError>;
