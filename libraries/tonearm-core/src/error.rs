//! Error types for library providers.

use thiserror::Error;

/// Result type alias using `ProviderError`
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised by a music-library server adapter
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP-style status code
        status: u16,
        /// Message returned by the server
        message: String,
    },

    /// Item does not exist on the server
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Operation not offered by this server protocol
    #[error("Not supported by server: {0}")]
    Unsupported(&'static str),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Create an unreachable error
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
