//! GET query-string parsing.
//!
//! The [`QueryStringParser`] reads `query`, `operationName`, `variables` and
//! `extensions` from the URL. `variables` and `extensions` hold JSON text.

use crate::ParseStrategy;
use daedalus_core::body::Body;
use daedalus_core::{BoxFuture, DaedalusError, GraphQLParams, Query, RequestParser, Value};
use http::request::Parts;
use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;

const INVALID_JSON: &str = "invalid JSON in query-string parameter";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedParams {
    query: Option<String>,
    operation_name: Option<String>,
    variables: Option<String>,
    extensions: Option<String>,
}

fn decode_json_map(
    name: &str,
    raw: Option<String>,
) -> Result<Option<IndexMap<String, Value>>, DaedalusError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => serde_json::from_str::<Option<IndexMap<String, Value>>>(text)
            .map_err(|e| DaedalusError::request_parse(format!("{INVALID_JSON} `{name}`: {e}"))),
    }
}

/// Decodes GraphQL parameters from `application/x-www-form-urlencoded` text.
///
/// # Errors
///
/// Returns [`DaedalusError::RequestParse`] if the text is not valid
/// url-encoding or `variables`/`extensions` are not JSON objects.
///
/// # Example
///
/// ```rust
/// use daedalus_extract::params_from_query_string;
///
/// let params = params_from_query_string("query=%7Bgreetings%7D").unwrap();
/// assert_eq!(params.query_text(), Some("{greetings}"));
/// assert!(params.variables.is_none());
/// ```
pub fn params_from_query_string(encoded: &str) -> Result<GraphQLParams, DaedalusError> {
    let raw: EncodedParams = serde_urlencoded::from_str(encoded)
        .map_err(|e| DaedalusError::request_parse(format!("invalid query string: {e}")))?;

    Ok(GraphQLParams {
        query: raw.query.map(Query::Text),
        operation_name: raw.operation_name,
        variables: decode_json_map("variables", raw.variables)?,
        extensions: decode_json_map("extensions", raw.extensions)?,
    })
}

/// Parses GET requests from the URL query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringParser;

impl RequestParser for QueryStringParser {
    fn name(&self) -> &'static str {
        "get"
    }

    fn parse<'a>(
        &'a self,
        head: &'a Parts,
        _body: Body,
    ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
        Box::pin(async move { params_from_query_string(head.uri.query().unwrap_or_default()) })
    }
}

impl ParseStrategy for QueryStringParser {
    fn accepts(&self, head: &Parts) -> bool {
        head.method == Method::GET
    }
}
