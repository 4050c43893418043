//! Error types for the bridge

use duc_client::DucClientError;
use thiserror::Error;

use crate::classification::Category;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Fatal bridge errors. Anything reaching the caller ends the process.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Talking to the controller failed
    #[error(transparent)]
    Duc(#[from] DucClientError),
}

/// A sink could not publish one batch
#[derive(Debug, Error)]
#[error("Failed to publish {category} batch: {message}")]
pub struct SinkError {
    pub category: Category,
    pub message: String,
}

impl SinkError {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}
