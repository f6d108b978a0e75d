//! Error types for the HTTP transport.

use qbatch_core::TransportError;
use thiserror::Error;

/// Errors raised while setting up an [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid engine URL '{0}': expected http:// or https://")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type for HTTP transport setup.
pub type HttpResult<T> = Result<T, HttpError>;

impl From<HttpError> for TransportError {
    fn from(e: HttpError) -> Self {
        TransportError::Request(e.to_string())
    }
}
