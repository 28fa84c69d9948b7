//! POST body parsers for JSON and raw GraphQL documents.

use crate::content::{is_post_with, read_body, DEFAULT_MAX_BODY_SIZE};
use crate::ParseStrategy;
use daedalus_core::body::Body;
use daedalus_core::{BoxFuture, DaedalusError, GraphQLParams, RequestParser};
use http::request::Parts;

/// Parses `application/json` POST bodies.
#[derive(Debug, Clone, Copy)]
pub struct JsonParser {
    max_body_size: usize,
}

impl JsonParser {
    /// Creates a parser with the given body limit.
    #[must_use]
    pub const fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl RequestParser for JsonParser {
    fn name(&self) -> &'static str {
        "post-json"
    }

    fn parse<'a>(
        &'a self,
        _head: &'a Parts,
        body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
        Box::pin(async move {
            let bytes = read_body(body, self.max_body_size).await?;
            GraphQLParams::from_json_slice(&bytes)
        })
    }
}

impl ParseStrategy for JsonParser {
    fn accepts(&self, head: &Parts) -> bool {
        is_post_with(head, |m| {
            m.type_() == mime::APPLICATION
                && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        })
    }
}

/// Parses `application/graphql` POST bodies, where the body is the query.
#[derive(Debug, Clone, Copy)]
pub struct GraphQLBodyParser {
    max_body_size: usize,
}

impl GraphQLBodyParser {
    /// Creates a parser with the given body limit.
    #[must_use]
    pub const fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl Default for GraphQLBodyParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl RequestParser for GraphQLBodyParser {
    fn name(&self) -> &'static str {
        "post-graphql"
    }

    fn parse<'a>(
        &'a self,
        _head: &'a Parts,
        body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
        Box::pin(async move {
            let bytes = read_body(body, self.max_body_size).await?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| DaedalusError::request_parse("request body is not valid UTF-8"))?;
            Ok(GraphQLParams::query(text))
        })
    }
}

impl ParseStrategy for GraphQLBodyParser {
    fn accepts(&self, head: &Parts) -> bool {
        is_post_with(head, |m| {
            m.type_() == mime::APPLICATION && m.subtype().as_str() == "graphql"
        })
    }
}
