//! End-to-end tests for the request lifecycle.

use bytes::Bytes;
use daedalus_core::body::{self, to_bytes};
use daedalus_core::{
    BoxFuture, ContextValue, DaedalusError, Document, Engine, ExecutionArgs, ExecutionResult,
    GraphQLError, InitialContext, OperationKind, Request, RequestParser, Response, Schema,
    ServerContext, Value,
};
use daedalus_extract::MultipartLimits;
use daedalus_middleware::plugins::{
    default_parser_plugins, CorsPlugin, CorsPolicy, EndpointPlugin,
};
use daedalus_middleware::{
    Capabilities, Lifecycle, OnParamsHook, OnRequestDone, OnRequestParsePayload, OnRequestPayload,
    Plugin,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use http::request::Parts;
use http::{Method, StatusCode};
use proptest::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex, OnceLock};

/// Echoes the query and variables; uploads come back as their text.
struct EchoEngine;

fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::new(()))
}

fn echo(value: &Value) -> serde_json::Value {
    match value {
        Value::Upload(upload) => json!(upload.text().unwrap_or_default()),
        Value::List(items) => items.iter().map(echo).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), echo(v)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        other => other.clone().into_json(),
    }
}

impl Engine for EchoEngine {
    fn schema(&self) -> &Schema {
        schema()
    }

    fn parse(&self, source: &str) -> Result<Document, Vec<GraphQLError>> {
        let kind = if source.starts_with("mutation") {
            OperationKind::Mutation
        } else {
            OperationKind::Query
        };
        Ok(Document::new(source.to_string(), vec![(None, kind)]))
    }

    fn validate(&self, _schema: &Schema, _document: &Document) -> Vec<GraphQLError> {
        Vec::new()
    }

    fn execute(&self, args: ExecutionArgs) -> BoxFuture<'_, ExecutionResult> {
        Box::pin(async move {
            let query = args.document.ast::<String>().cloned().unwrap_or_default();
            let mut data = json!({ "query": query });
            if !args.variables.is_empty() {
                data["variables"] = echo(&Value::Object(args.variables));
            }
            ExecutionResult::data(data)
        })
    }

    fn subscribe(
        &self,
        _args: ExecutionArgs,
    ) -> BoxFuture<'_, Result<BoxStream<'static, ExecutionResult>, ExecutionResult>> {
        Box::pin(async { Ok(stream::empty().boxed()) })
    }

    fn context_factory(&self, _initial: &InitialContext) -> ContextValue {
        Arc::new(())
    }
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request {
    http::Request::get(uri).body(body::empty()).unwrap()
}

fn standard_lifecycle(limits: MultipartLimits) -> Lifecycle {
    Lifecycle::builder(Arc::new(EchoEngine))
        .plugins(default_parser_plugins(Some(limits), 1 << 20))
        .build()
}

fn multipart(operations: &str, map: &str, files: &[(&str, &[u8])]) -> Request {
    let boundary = "daedalus-boundary";
    let mut payload = Vec::new();
    for (name, value) in [("operations", operations.as_bytes()), ("map", map.as_bytes())] {
        payload.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                .as_bytes(),
        );
        payload.extend_from_slice(value);
        payload.extend_from_slice(b"\r\n");
    }
    for (name, content) in files {
        payload.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.txt\"\r\nContent-Type: text/plain\r\n\r\n"
            )
            .as_bytes(),
        );
        payload.extend_from_slice(content);
        payload.extend_from_slice(b"\r\n");
    }
    payload.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    http::Request::post("/graphql")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(body::full(payload))
        .unwrap()
}

#[tokio::test]
async fn get_query_is_echoed_without_variables() {
    let lifecycle = standard_lifecycle(MultipartLimits::default());
    let response = lifecycle
        .handle(get("/graphql?query={greetings}"), &ServerContext::new())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"data": {"query": "{greetings}"}})
    );
}

#[tokio::test]
async fn get_requests_are_idempotent() {
    let lifecycle = standard_lifecycle(MultipartLimits::default());
    let ctx = ServerContext::new();
    let uri = "/graphql?query={greetings}&variables=%7B%22a%22%3A1%7D";

    let first = json_body(lifecycle.handle(get(uri), &ctx).await).await;
    let second = json_body(lifecycle.handle(get(uri), &ctx).await).await;
    assert_eq!(first, second);
    assert_eq!(first["data"]["variables"]["a"], 1);
}

#[tokio::test]
async fn multipart_upload_is_bound_into_variables() {
    let lifecycle = standard_lifecycle(MultipartLimits::default());
    let request = multipart(
        r#"{"query":"mutation ($file: Upload!) { readFile(file: $file) }","variables":{"file":null}}"#,
        r#"{"0":["variables.file"]}"#,
        &[("0", b"hello")],
    );

    let response = lifecycle.handle(request, &ServerContext::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["variables"]["file"], "hello");
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let lifecycle = standard_lifecycle(MultipartLimits::default().file_size(5));
    let request = multipart(
        r#"{"query":"mutation { a }","variables":{"file":null}}"#,
        r#"{"0":["variables.file"]}"#,
        &[("0", b"more than five bytes")],
    );

    let response = lifecycle.handle(request, &ServerContext::new()).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        json_body(response).await,
        json!({"errors": [{"message": "File size limit of 5 bytes exceeded"}]})
    );
}

#[tokio::test]
async fn later_parser_plugin_wins() {
    struct Fixed(&'static str);

    impl RequestParser for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn parse<'a>(
            &'a self,
            _head: &'a Parts,
            _body: daedalus_core::Body,
        ) -> BoxFuture<'a, Result<daedalus_core::GraphQLParams, DaedalusError>> {
            Box::pin(async move { Ok(daedalus_core::GraphQLParams::query(self.0)) })
        }
    }

    struct Setter(&'static str);

    impl Plugin for Setter {
        fn name(&self) -> &'static str {
            self.0
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ON_REQUEST_PARSE
        }

        fn on_request_parse(
            &self,
            payload: &mut OnRequestParsePayload<'_>,
        ) -> Option<OnParamsHook> {
            payload.set_request_parser(Arc::new(Fixed(self.0)));
            None
        }
    }

    let lifecycle = Lifecycle::builder(Arc::new(EchoEngine))
        .plugins(default_parser_plugins(None, 1024))
        .plugin(Setter("{ first }"))
        .plugin(Setter("{ second }"))
        .build();

    let body = json_body(
        lifecycle
            .handle(get("/graphql?query=%7B%20ignored%20%7D"), &ServerContext::new())
            .await,
    )
    .await;
    assert_eq!(body["data"]["query"], "{ second }");
}

#[tokio::test]
async fn cors_preflight_for_listed_origins() {
    let lifecycle = Lifecycle::builder(Arc::new(EchoEngine))
        .plugin(CorsPlugin::new(
            CorsPolicy::builder()
                .allow_origins(["http://a.test", "http://b.test"])
                .allow_credentials(true)
                .build(),
        ))
        .plugin(EndpointPlugin::new("/graphql"))
        .plugins(default_parser_plugins(None, 1024))
        .build();

    for origin in ["http://a.test", "http://b.test"] {
        let request = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/graphql")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(body::empty())
            .unwrap();

        let response = lifecycle.handle(request, &ServerContext::new()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], origin);
        assert_eq!(headers["access-control-allow-methods"], "POST");
        assert_eq!(headers["access-control-allow-headers"], "content-type");
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["vary"], "Origin, Access-Control-Request-Headers");
    }

    let request = http::Request::get("/graphql?query={a}")
        .header("origin", "http://a.test")
        .body(body::empty())
        .unwrap();
    let response = lifecycle.handle(request, &ServerContext::new()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "http://a.test");
}

#[tokio::test]
async fn cors_preflight_for_unlisted_origin_is_null() {
    let lifecycle = Lifecycle::builder(Arc::new(EchoEngine))
        .plugin(CorsPlugin::new(
            CorsPolicy::builder().allow_origin("http://b.test").build(),
        ))
        .plugin(EndpointPlugin::new("/graphql"))
        .plugins(default_parser_plugins(None, 1024))
        .build();

    let request = http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/graphql")
        .header("origin", "http://a.test")
        .header("access-control-request-method", "POST")
        .body(body::empty())
        .unwrap();

    let response = lifecycle.handle(request, &ServerContext::new()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "null");
    assert_eq!(headers["vary"], "Origin");
    assert!(headers.get("access-control-allow-credentials").is_none());
}

type Log = Arc<Mutex<Vec<String>>>;

struct Step {
    index: usize,
    ends: bool,
    log: Log,
}

impl Plugin for Step {
    fn name(&self) -> &'static str {
        "step"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ON_REQUEST
    }

    fn on_request<'a>(
        &'a self,
        mut payload: OnRequestPayload<'a>,
    ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("request:{}", self.index));
            if self.ends {
                payload.end_response(
                    http::Response::builder()
                        .status(StatusCode::ACCEPTED)
                        .body(body::full(Bytes::from_static(b"early")))
                        .unwrap(),
                );
            }
            let log = self.log.clone();
            let index = self.index;
            let done: OnRequestDone = Box::new(move |_| {
                log.lock().unwrap().push(format!("done:{index}"));
            });
            Ok(Some(done))
        })
    }
}

proptest! {
    #[test]
    fn short_circuit_skips_later_hooks(count in 1usize..8, cut in 0usize..8) {
        let cut = cut % count;
        let log: Log = Arc::default();
        let lifecycle = Lifecycle::builder(Arc::new(EchoEngine))
            .plugins((0..count).map(|index| {
                Arc::new(Step { index, ends: index == cut, log: log.clone() }) as Arc<dyn Plugin>
            }))
            .build();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let response = runtime.block_on(lifecycle.handle(get("/graphql"), &ServerContext::new()));
        prop_assert_eq!(response.status(), StatusCode::ACCEPTED);

        let expected: Vec<String> = (0..=cut)
            .map(|i| format!("request:{i}"))
            .chain((0..=cut).map(|i| format!("done:{i}")))
            .collect();
        prop_assert_eq!(log.lock().unwrap().clone(), expected);
    }
}
