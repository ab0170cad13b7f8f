//! Error types shared across the sync pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pipeline's collaborators.
///
/// Nothing in the write path propagates these to the UI layer; controllers
/// log and swallow them. They exist so the reconciler and stores can branch
/// on success/failure and so tests can assert on outcomes.
#[derive(Debug, Error)]
pub enum Error {
    /// Local persistence failure (store unavailable, constraint violation).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote call failure, with the HTTP status when one was received.
    #[error("Remote error: {message}")]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// Payload (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Error {
    /// Create a storage error from a message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a remote error from an optional status and a message.
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }
}
