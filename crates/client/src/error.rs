//! Error types for the gateway admin client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the gateway.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection error (network failure, DNS resolution, etc.).
    #[error("connection error: {0}")]
    Connection(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP error with status code.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The registry has no such consumer.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied arguments were missing or empty.
    #[error("validation error: {0}")]
    Validation(String),

    /// Response deserialization error.
    #[error("failed to deserialize response: {0}")]
    Deserialization(String),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Map a transport-level `reqwest` failure, keeping timeouts distinct.
    pub(crate) fn transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Connection(err.to_string())
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Connection errors, timeouts, and HTTP 5xx errors return `true`.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::NotFound(_)
            | Self::Validation(_)
            | Self::Deserialization(_)
            | Self::Configuration(_) => false,
        }
    }

    /// Returns `true` if the gateway reported the consumer as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for failures originating at the gateway or the network.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Http { .. } | Self::Deserialization(_)
        )
    }

    /// Returns the HTTP status code, if the gateway answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }
}
