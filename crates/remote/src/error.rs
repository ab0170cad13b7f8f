//! Error types for the remote REST adapter.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (non-object payload, bad URL, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl RemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) => ApiRetryClass::Permanent,
            Self::InvalidRequest(_) => ApiRetryClass::Permanent,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
        }
    }
}

impl From<RemoteError> for daypack_core::Error {
    fn from(err: RemoteError) -> Self {
        daypack_core::Error::Remote {
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}
