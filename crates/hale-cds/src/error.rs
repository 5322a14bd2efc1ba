//! Error types for the CDS engine

use std::time::Duration;
use thiserror::Error;

/// Result type alias for CDS operations
pub type Result<T> = std::result::Result<T, CdsError>;

/// Errors raised by the CDS engine and service handlers
#[derive(Error, Debug)]
pub enum CdsError {
    #[error("no CDS service registered with ID '{0}'")]
    UnknownService(String),

    #[error("service did not respond within {0:?}")]
    Timeout(Duration),

    #[error("external service error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service failed: {0}")]
    Service(String),
}

impl CdsError {
    /// Create a service-level error
    pub fn service<S: Into<String>>(msg: S) -> Self {
        CdsError::Service(msg.into())
    }
}
