//! Test error types.

use thiserror::Error;

/// Errors raised while building or reading test requests.
#[derive(Error, Debug)]
pub enum TestError {
    /// Request building failed.
    #[error("request build error: {0}")]
    RequestBuild(String),
    /// Response body reading failed.
    #[error("body read error: {0}")]
    BodyRead(String),
    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
