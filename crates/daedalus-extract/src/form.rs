//! URL-encoded form POST parsing.

use crate::content::{is_post_with, read_body, DEFAULT_MAX_BODY_SIZE};
use crate::query::params_from_query_string;
use crate::ParseStrategy;
use daedalus_core::body::Body;
use daedalus_core::{BoxFuture, DaedalusError, GraphQLParams, RequestParser};
use http::request::Parts;

/// Parses `application/x-www-form-urlencoded` POST bodies.
///
/// The fields are the same as for GET requests.
#[derive(Debug, Clone, Copy)]
pub struct FormParser {
    max_body_size: usize,
}

impl FormParser {
    /// Creates a parser with the given body limit.
    #[must_use]
    pub const fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl Default for FormParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl RequestParser for FormParser {
    fn name(&self) -> &'static str {
        "post-form"
    }

    fn parse<'a>(
        &'a self,
        _head: &'a Parts,
        body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
        Box::pin(async move {
            let bytes = read_body(body, self.max_body_size).await?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| DaedalusError::request_parse("form body is not valid UTF-8"))?;
            params_from_query_string(text)
        })
    }
}

impl ParseStrategy for FormParser {
    fn accepts(&self, head: &Parts) -> bool {
        is_post_with(head, |m| {
            m.type_() == mime::APPLICATION && m.subtype() == mime::WWW_FORM_URLENCODED
        })
    }
}
