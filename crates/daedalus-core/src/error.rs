//! Error types for Daedalus.
//!
//! This module provides [`DaedalusError`], the error taxonomy shared by the
//! request pipeline, and [`GraphQLError`], the wire shape of a single entry in
//! a GraphQL `errors` list.
//!
//! | Variant | HTTP status |
//! |---|---|
//! | `RequestParse` | 400 |
//! | `PayloadTooLarge` | 413 |
//! | `Validation` | 400 |
//! | `MethodNotAllowed` | 405 |
//! | `NotFound` | 404 |
//! | `Readiness` | 500 |
//! | `GraphQL` | 500 |
//! | `Internal` | 500 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`DaedalusError`].
pub type DaedalusResult<T> = Result<T, DaedalusError>;

/// The multipart resource limit that a request exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MultipartLimit {
    /// Maximum bytes in a single file part.
    FileSize,
    /// Maximum number of file parts.
    Files,
    /// Maximum bytes in a non-file field.
    FieldSize,
    /// Maximum cumulative header bytes across all parts.
    HeaderSize,
    /// Maximum bytes in the whole request body.
    BodySize,
}

impl fmt::Display for MultipartLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileSize => "File size",
            Self::Files => "File count",
            Self::FieldSize => "Field size",
            Self::HeaderSize => "Header size",
            Self::BodySize => "Body size",
        })
    }
}

/// Standard error type for Daedalus.
///
/// # Example
///
/// ```
/// use daedalus_core::DaedalusError;
/// use http::StatusCode;
///
/// let err = DaedalusError::request_parse("invalid JSON in query-string parameter");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Error, Debug)]
pub enum DaedalusError {
    /// The request could not be turned into GraphQL parameters.
    #[error("{0}")]
    RequestParse(String),

    /// A multipart resource limit was exceeded.
    #[error("{limit} limit of {max} {unit} exceeded", unit = limit_unit(.limit))]
    PayloadTooLarge {
        /// Which limit was hit.
        limit: MultipartLimit,
        /// The configured maximum.
        max: usize,
    },

    /// The request reached execution without a usable query.
    #[error("{0}")]
    Validation(String),

    /// The operation is not allowed over this HTTP method.
    #[error("Can only perform a {operation} operation from a POST request.")]
    MethodNotAllowed {
        /// The rejected operation kind, e.g. `mutation`.
        operation: &'static str,
    },

    /// The request did not target a GraphQL endpoint.
    #[error("Unable to detect a GraphQL endpoint at {path}")]
    NotFound {
        /// The requested path.
        path: String,
    },

    /// The readiness self-probe failed.
    #[error("Readiness check failed: {0}")]
    Readiness(String),

    /// A structured GraphQL error.
    #[error("{}", .0.message)]
    GraphQL(GraphQLError),

    /// Internal error.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

const fn limit_unit(limit: &MultipartLimit) -> &'static str {
    match limit {
        MultipartLimit::Files => "files",
        _ => "bytes",
    }
}

impl DaedalusError {
    /// Creates a request parse error.
    #[must_use]
    pub fn request_parse(message: impl Into<String>) -> Self {
        Self::RequestParse(message.into())
    }

    /// Creates a payload-too-large error.
    #[must_use]
    pub const fn payload_too_large(limit: MultipartLimit, max: usize) -> Self {
        Self::PayloadTooLarge { limit, max }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a readiness error.
    #[must_use]
    pub fn readiness(message: impl Into<String>) -> Self {
        Self::Readiness(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestParse(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Readiness(_) | Self::GraphQL(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` if this error is rendered as a regular response.
    ///
    /// Classified errors keep running completion hooks. Everything else
    /// goes through the fatal fallback.
    #[must_use]
    pub const fn is_classified(&self) -> bool {
        matches!(
            self,
            Self::RequestParse(_)
                | Self::PayloadTooLarge { .. }
                | Self::Validation(_)
                | Self::MethodNotAllowed { .. }
                | Self::NotFound { .. }
        )
    }

    /// Converts this error into a GraphQL error entry.
    ///
    /// Structured errors are passed through unchanged; everything else
    /// becomes a plain message.
    #[must_use]
    pub fn to_graphql_error(&self) -> GraphQLError {
        match self {
            Self::GraphQL(err) => err.clone(),
            other => GraphQLError::new(other.to_string()),
        }
    }
}

impl From<GraphQLError> for DaedalusError {
    fn from(err: GraphQLError) -> Self {
        Self::GraphQL(err)
    }
}

/// A single entry of a GraphQL `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable error message.
    pub message: String,
    /// Path to the response field that produced the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<serde_json::Value>>,
    /// Additional error metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Map<String, serde_json::Value>>,
}

impl GraphQLError {
    /// Creates an error with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }

    /// Adds an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// Returns `true` if the error was explicitly marked safe to show clients.
    #[must_use]
    pub fn is_exposed(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("expose"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The `{"errors": [...]}` response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error entries.
    pub errors: Vec<GraphQLError>,
}

impl ErrorResponse {
    /// Creates an envelope with a single error.
    #[must_use]
    pub fn single(error: GraphQLError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl From<&DaedalusError> for ErrorResponse {
    fn from(err: &DaedalusError) -> Self {
        Self::single(err.to_graphql_error())
    }
}
