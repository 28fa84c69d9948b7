//! The default request processor.
//!
//! Runs parse, validate and execute (or subscribe) against the engine and
//! renders the outcome: a single JSON body for queries and mutations, and an
//! incremental body for subscriptions (`text/event-stream` when the client
//! accepts it, `multipart/mixed` otherwise).

use crate::response::{self, APPLICATION_JSON, GRAPHQL_RESPONSE_JSON};
use bytes::Bytes;
use daedalus_core::body;
use daedalus_core::{
    BoxFuture, DaedalusError, Engine, ExecutionArgs, ExecutionResult, GraphQLError,
    InitialContext, OperationKind, Query, Response,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;

const MULTIPART_MIXED: &str = "multipart/mixed; boundary=\"-\"";
const EVENT_STREAM: &str = "text/event-stream";

/// Executes a request with frozen parameters and renders the response.
///
/// The lifecycle calls this at most once per request.
pub trait RequestProcessor: Send + Sync + 'static {
    /// Processes the request.
    ///
    /// Classified errors (see [`DaedalusError::is_classified`]) are rendered
    /// as regular responses; anything else reaches the fatal fallback.
    fn process(
        &self,
        initial: InitialContext,
        engine: Arc<dyn Engine>,
    ) -> BoxFuture<'_, Result<Response, DaedalusError>>;
}

/// The built-in processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProcessor {
    mask_errors: bool,
}

impl DefaultProcessor {
    /// Creates a processor, optionally masking execution errors.
    #[must_use]
    pub const fn new(mask_errors: bool) -> Self {
        Self { mask_errors }
    }
}

impl RequestProcessor for DefaultProcessor {
    fn process(
        &self,
        initial: InitialContext,
        engine: Arc<dyn Engine>,
    ) -> BoxFuture<'_, Result<Response, DaedalusError>> {
        Box::pin(process_request(initial, engine, self.mask_errors))
    }
}

fn accepts(headers: &HeaderMap, media_type: &str) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(media_type))
}

fn json_content_type(headers: &HeaderMap) -> &'static str {
    if accepts(headers, "application/graphql-response+json") {
        GRAPHQL_RESPONSE_JSON
    } else {
        APPLICATION_JSON
    }
}

fn render_errors(headers: &HeaderMap, errors: Vec<GraphQLError>) -> Response {
    response::json(
        StatusCode::BAD_REQUEST,
        json_content_type(headers),
        &ExecutionResult::errors(errors),
    )
}

fn finish(mut result: ExecutionResult, mask_errors: bool) -> ExecutionResult {
    if mask_errors {
        result.errors = result.errors.into_iter().map(response::mask).collect();
    }
    result
}

fn to_json(result: &ExecutionResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to serialize execution result");
        r#"{"errors":[{"message":"Unexpected error."}]}"#.to_string()
    })
}

fn render_event_stream(results: BoxStream<'static, ExecutionResult>, mask_errors: bool) -> Response {
    let events = results
        .map(move |result| {
            let json = to_json(&finish(result, mask_errors));
            Ok::<_, Infallible>(Bytes::from(format!("event: next\ndata: {json}\n\n")))
        })
        .chain(stream::iter([Ok(Bytes::from_static(
            b"event: complete\ndata:\n\n",
        ))]));

    let mut response = response::with_body(StatusCode::OK, EVENT_STREAM, body::stream(events));
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn render_multipart(results: BoxStream<'static, ExecutionResult>, mask_errors: bool) -> Response {
    let parts = stream::iter([Ok::<_, Infallible>(Bytes::from_static(b"---"))])
        .chain(results.map(move |result| {
            let json = to_json(&finish(result, mask_errors));
            Ok(Bytes::from(format!(
                "\r\nContent-Type: {APPLICATION_JSON}\r\nContent-Length: {}\r\n\r\n{json}\r\n---",
                json.len()
            )))
        }))
        .chain(stream::iter([Ok(Bytes::from_static(b"--\r\n"))]));

    response::with_body(StatusCode::OK, MULTIPART_MIXED, body::stream(parts))
}

/// Runs one GraphQL request against `engine`.
///
/// # Errors
///
/// Returns [`DaedalusError::Validation`] when there is no query or the
/// operation cannot be selected, and [`DaedalusError::MethodNotAllowed`] for
/// a mutation sent with `GET`.
pub async fn process_request(
    initial: InitialContext,
    engine: Arc<dyn Engine>,
    mask_errors: bool,
) -> Result<Response, DaedalusError> {
    let params = initial.params();
    let headers = initial.headers();

    let document = match &params.query {
        Some(Query::Text(text)) if !text.trim().is_empty() => match engine.parse(text) {
            Ok(document) => document,
            Err(errors) => return Ok(render_errors(headers, errors)),
        },
        Some(Query::Document(document)) => document.clone(),
        _ => return Err(DaedalusError::validation("Must provide query string.")),
    };

    let errors = engine.validate(engine.schema(), &document);
    if !errors.is_empty() {
        return Ok(render_errors(headers, errors));
    }

    let operation_name = params.operation_name.clone();
    let kind = document
        .operation_kind(operation_name.as_deref())
        .ok_or_else(|| {
            DaedalusError::validation(match &operation_name {
                Some(name) => format!("Unknown operation named \"{name}\"."),
                None => "Must provide operation name if query contains multiple operations."
                    .to_string(),
            })
        })?;

    if kind == OperationKind::Mutation && initial.method() == Method::GET {
        return Err(DaedalusError::MethodNotAllowed {
            operation: kind.as_str(),
        });
    }

    let args = ExecutionArgs {
        schema: engine.schema().clone(),
        document,
        variables: params.variables.clone().unwrap_or_default(),
        operation_name,
        context: engine.context_factory(&initial),
    };

    tracing::debug!(operation = %kind, "executing operation");

    if kind == OperationKind::Subscription {
        return Ok(match engine.subscribe(args).await {
            Ok(results) if accepts(headers, EVENT_STREAM) => {
                render_event_stream(results, mask_errors)
            }
            Ok(results) => render_multipart(results, mask_errors),
            Err(result) => response::json(
                StatusCode::OK,
                json_content_type(headers),
                &finish(result, mask_errors),
            ),
        });
    }

    let result = finish(engine.execute(args).await, mask_errors);
    Ok(response::json(
        StatusCode::OK,
        json_content_type(headers),
        &result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, body_text, StubEngine};
    use daedalus_core::{Document, GraphQLParams, ServerContext, Value};
    use http::Uri;

    fn initial(method: Method, params: GraphQLParams, accept: Option<&str>) -> InitialContext {
        let mut headers = HeaderMap::new();
        if let Some(accept) = accept {
            headers.insert(header::ACCEPT, HeaderValue::from_str(accept).unwrap());
        }
        InitialContext::new(
            method,
            Uri::from_static("/graphql"),
            headers,
            params,
            ServerContext::new(),
        )
    }

    async fn run(
        method: Method,
        params: GraphQLParams,
        accept: Option<&str>,
    ) -> Result<Response, DaedalusError> {
        process_request(initial(method, params, accept), Arc::new(StubEngine), false).await
    }

    #[tokio::test]
    async fn test_query_executes() {
        let response = run(
            Method::GET,
            GraphQLParams::query("{ greetings }").with_variable("x", "y"),
            None,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], APPLICATION_JSON);
        let body = body_json(response).await;
        assert_eq!(body["data"]["query"], "{ greetings }");
        assert_eq!(body["data"]["variables"]["x"], "y");
    }

    #[tokio::test]
    async fn test_missing_or_blank_query() {
        for params in [GraphQLParams::default(), GraphQLParams::query("   ")] {
            let err = run(Method::POST, params, None).await.unwrap_err();
            assert!(matches!(err, DaedalusError::Validation(ref m) if m == "Must provide query string."));
        }
    }

    #[tokio::test]
    async fn test_mutation_over_get_is_rejected() {
        let err = run(Method::GET, GraphQLParams::query("mutation { a }"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DaedalusError::MethodNotAllowed { operation: "mutation" }));

        let response = run(Method::POST, GraphQLParams::query("mutation { a }"), None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_parse_and_validation_errors() {
        let response = run(Method::POST, GraphQLParams::query("{{ a }"), None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = run(Method::POST, GraphQLParams::query("{ unknownField }"), None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body.get("data").is_none());
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_name() {
        let err = run(
            Method::POST,
            GraphQLParams::query("{ a }").with_operation_name("Missing"),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DaedalusError::Validation(_)));
    }

    #[tokio::test]
    async fn test_pre_parsed_document_skips_parse() {
        let document = Document::new("{ parsed }".to_string(), vec![(None, OperationKind::Query)]);
        let params = GraphQLParams {
            query: Some(Query::Document(document)),
            ..GraphQLParams::default()
        };
        let body = body_json(run(Method::POST, params, None).await.unwrap()).await;
        assert_eq!(body["data"]["query"], "{ parsed }");
    }

    #[tokio::test]
    async fn test_graphql_response_json_negotiation() {
        let response = run(
            Method::POST,
            GraphQLParams::query("{ a }"),
            Some("application/graphql-response+json, application/json"),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], GRAPHQL_RESPONSE_JSON);
    }

    #[tokio::test]
    async fn test_masked_execution_errors() {
        let response = process_request(
            initial(Method::POST, GraphQLParams::query("{ boom }"), None),
            Arc::new(StubEngine),
            true,
        )
        .await
        .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["message"], response::MASKED_MESSAGE);
    }

    #[tokio::test]
    async fn test_subscription_as_event_stream() {
        let response = run(
            Method::GET,
            GraphQLParams::query("subscription { count }"),
            Some("text/event-stream"),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], EVENT_STREAM);

        let text = body_text(response).await;
        assert_eq!(
            text,
            "event: next\ndata: {\"data\":{\"count\":1}}\n\n\
             event: next\ndata: {\"data\":{\"count\":2}}\n\n\
             event: complete\ndata:\n\n"
        );
    }

    #[tokio::test]
    async fn test_subscription_as_multipart_mixed() {
        let response = run(
            Method::POST,
            GraphQLParams::query("subscription { count }"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], MULTIPART_MIXED);

        let text = body_text(response).await;
        assert!(text.starts_with("---\r\nContent-Type: application/json"));
        assert!(text.contains("{\"data\":{\"count\":2}}"));
        assert!(text.ends_with("\r\n-----\r\n"));
    }

    #[tokio::test]
    async fn test_uploads_reach_engine_as_null_json() {
        let upload = daedalus_core::UploadRef::new(None, None, Bytes::from_static(b"hi"));
        let params = GraphQLParams::query("mutation { read }").with_variable("file", Value::Upload(upload));
        let body = body_json(run(Method::POST, params, None).await.unwrap()).await;
        assert_eq!(body["data"]["variables"]["file"], serde_json::Value::Null);
    }
}
