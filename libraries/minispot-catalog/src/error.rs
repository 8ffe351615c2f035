//! Error types for the catalog client.

use minispot_core::MinispotError;
use thiserror::Error;

/// Errors that can occur when talking to the catalog service.
#[derive(Error, Debug)]
pub enum CatalogClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service returned an error response
    #[error("Catalog error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication failed (missing or expired token)
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Invalid service URL
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse a response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Service is offline or unreachable
    #[error("Catalog unreachable: {0}")]
    Unreachable(String),

    /// IO error (runtime creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog client operations.
pub type Result<T> = std::result::Result<T, CatalogClientError>;

impl From<CatalogClientError> for MinispotError {
    fn from(err: CatalogClientError) -> Self {
        match err {
            CatalogClientError::NotFound(what) => MinispotError::NotFound(what),
            CatalogClientError::InvalidUrl(msg) => MinispotError::Config(msg),
            other => MinispotError::Transport(other.to_string()),
        }
    }
}
