//! The request parser seam.

use crate::body::{Body, BoxFuture};
use crate::error::DaedalusError;
use crate::params::GraphQLParams;
use http::request::Parts;

/// Turns a raw request into [`GraphQLParams`].
///
/// Parsers receive the request head by reference and own the body, so they
/// can stream it. Only one parser is active for a request.
pub trait RequestParser: Send + Sync + 'static {
    /// Returns the parser name, used in logs.
    fn name(&self) -> &'static str;

    /// Parses the request.
    fn parse<'a>(
        &'a self,
        head: &'a Parts,
        body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>>;
}

/// The parser active before any plugin installs one.
///
/// It yields empty parameters, so execution later fails with a missing-query
/// validation error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopParser;

impl RequestParser for NoopParser {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn parse<'a>(
        &'a self,
        _head: &'a Parts,
        _body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
        Box::pin(async { Ok(GraphQLParams::default()) })
    }
}
