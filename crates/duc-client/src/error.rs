//! Error types for DUC client operations

use thiserror::Error;

/// Result type alias for DUC client operations
pub type Result<T> = std::result::Result<T, DucClientError>;

/// Errors that can occur while talking to a DUC
#[derive(Error, Debug)]
pub enum DucClientError {
    /// Connection URL is unusable (missing credentials, non-empty path)
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Controller answered with a non-200 status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to decode a 200 response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Credentials rejected or no session cookie issued
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Well-formed RPC envelope carrying a non-empty `error`
    #[error("RPC {method} failed: {message}")]
    RpcError { method: String, message: String },
}

impl DucClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// True for failures of the HTTP exchange itself (I/O or status)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::HttpError(_) | Self::ServerError { .. })
    }
}

impl From<url::ParseError> for DucClientError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}
