//! Error types for pulse-link.

use thiserror::Error;

/// Errors surfaced by the client, the transport and the event decoder.
#[derive(Error, Debug, Clone)]
pub enum PulseLinkError {
    /// Transport-level failure (DNS, refused connection, reset, TLS).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request did not complete within its timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// The service answered with a non-2xx status.
    #[error("Server error ({status_code}): {message}")]
    ServerError {
        /// HTTP status code returned by the service
        status_code: u16,
        /// Response body or a short description of it
        message: String,
    },

    /// A response envelope could not be parsed.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The configured crypto module rejected a payload.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Invalid arguments passed to a public operation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The client was destroyed and no longer accepts operations.
    #[error("Client has been destroyed")]
    ClientDestroyed,

    /// Unexpected internal condition (task died, channel closed).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PulseLinkError {
    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ServerError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns true for 403 responses (missing or revoked permissions).
    pub fn is_access_denied(&self) -> bool {
        self.status_code() == Some(403)
    }

    /// Returns true when retrying the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::TimeoutError(_) | Self::DecodeError(_) => true,
            Self::ServerError { status_code, .. } => *status_code == 403 || *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PulseLinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if let Some(status) = err.status() {
            Self::ServerError {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::DecodeError(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PulseLinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}

/// Result type for pulse-link operations.
pub type Result<T> = std::result::Result<T, PulseLinkError>;
