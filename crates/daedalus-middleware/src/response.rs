//! Response builders used by the lifecycle and the plugins.

use daedalus_core::body::{self, Body};
use daedalus_core::{DaedalusError, ErrorResponse, GraphQLError, Response};
use http::{header, HeaderValue, StatusCode};
use serde::Serialize;

/// `application/json; charset=utf-8`
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// `application/graphql-response+json; charset=utf-8`
pub const GRAPHQL_RESPONSE_JSON: &str = "application/graphql-response+json; charset=utf-8";

/// Message used in place of masked errors.
pub const MASKED_MESSAGE: &str = "Unexpected error.";

/// Creates a response with the given status and body.
pub fn with_body(status: StatusCode, content_type: &'static str, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Creates an empty response with the given status.
pub fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(body::empty());
    *response.status_mut() = status;
    response
}

/// Serializes `value` as a JSON response.
pub fn json<T: Serialize>(status: StatusCode, content_type: &'static str, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => with_body(status, content_type, body::full(bytes)),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize response body");
            with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                APPLICATION_JSON,
                body::full(r#"{"errors":[{"message":"Unexpected error."}]}"#),
            )
        }
    }
}

/// Replaces the message of an error that was not marked safe to expose.
pub fn mask(error: GraphQLError) -> GraphQLError {
    if error.is_exposed() {
        error
    } else {
        GraphQLError {
            message: MASKED_MESSAGE.to_string(),
            path: error.path,
            extensions: None,
        }
    }
}

/// Renders a pipeline error as a GraphQL error response.
///
/// Classified errors keep their message. With `mask_errors`, everything else
/// is replaced by a generic message unless it is an exposed GraphQL error.
pub fn error(err: &DaedalusError, mask_errors: bool) -> Response {
    let mut entry = err.to_graphql_error();
    if mask_errors && !err.is_classified() {
        entry = mask(entry);
    }

    let mut response = json(
        err.status_code(),
        APPLICATION_JSON,
        &ErrorResponse::single(entry),
    );
    if let DaedalusError::MethodNotAllowed { .. } = err {
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("POST"));
    }
    response
}
