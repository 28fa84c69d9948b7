//! The request lifecycle engine.
//!
//! [`Lifecycle::handle`] drives every request through the same phases:
//!
//! ```text
//! on_request hooks ─┬─ ended early ─────────────────────────────┐
//!                   └─ parser selection → parse → params hooks  │
//!                        → envelop → processor ─────────────────┤
//!                                                               ▼
//!                                           done hooks → response
//! ```
//!
//! Plugins run strictly in registration order. Any unclassified failure is
//! caught once at the top and rendered as a 500 without running done hooks;
//! the request is still counted in the request metrics.

use crate::plugin::{
    Capabilities, OnParamsHook, OnParamsPayload, OnRequestDone, OnRequestParsePayload,
    OnRequestPayload, Plugin,
};
use crate::process::{DefaultProcessor, RequestProcessor};
use crate::response;
use daedalus_core::{
    DaedalusError, Engine, Envelop, InitialContext, Request, RequestParser, Response,
    ServerContext,
};
use daedalus_telemetry::metrics::record_request;
use http::request::Parts;
use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A type-erased plugin.
pub type BoxedPlugin = Arc<dyn Plugin>;

/// The outcome of parser selection.
pub struct ParserResolution {
    /// The parser to run.
    pub parser: Arc<dyn RequestParser>,
    /// Hooks to run on the parsed parameters, in registration order.
    pub params_hooks: Vec<OnParamsHook>,
}

impl fmt::Debug for ParserResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserResolution")
            .field("parser", &self.parser.name())
            .field("params_hooks", &self.params_hooks.len())
            .finish()
    }
}

/// Chooses the request parser.
///
/// Starts from the no-op parser and offers each plugin, in order, the chance
/// to replace it. The last plugin to set a parser wins.
pub fn resolve_parser<'p>(
    plugins: impl IntoIterator<Item = &'p dyn Plugin>,
    head: &Parts,
    server_context: &ServerContext,
) -> ParserResolution {
    let mut payload = OnRequestParsePayload::new(head, server_context);
    let mut params_hooks = Vec::new();

    for plugin in plugins {
        if let Some(hook) = plugin.on_request_parse(&mut payload) {
            params_hooks.push(hook);
        }
    }

    ParserResolution {
        parser: payload.into_parser(),
        params_hooks,
    }
}

/// The request lifecycle.
///
/// Immutable once built; share it behind an [`Arc`] across connections.
///
/// # Example
///
/// ```ignore
/// use daedalus_middleware::Lifecycle;
///
/// let lifecycle = Lifecycle::builder(engine)
///     .plugin(CorsPlugin::new(CorsPolicy::default()))
///     .plugins(default_parser_plugins(Some(limits), max_body_size))
///     .build();
///
/// let response = lifecycle.handle(request, &server_context).await;
/// ```
pub struct Lifecycle {
    plugins: Vec<BoxedPlugin>,
    on_request: Vec<usize>,
    on_request_parse: Vec<usize>,
    envelop: Arc<dyn Envelop>,
    processor: Arc<dyn RequestProcessor>,
    mask_errors: bool,
}

impl Lifecycle {
    /// Creates a builder that uses the same engine for every request.
    pub fn builder(engine: Arc<dyn Engine>) -> LifecycleBuilder {
        LifecycleBuilder::new(Arc::new(engine))
    }

    /// Creates a builder that asks `envelop` for the engine per request.
    pub fn builder_with_envelop(envelop: Arc<dyn Envelop>) -> LifecycleBuilder {
        LifecycleBuilder::new(envelop)
    }

    /// Handles one request. Never fails.
    pub async fn handle(&self, request: Request, server_context: &ServerContext) -> Response {
        let method = request.method().clone();
        let started = Instant::now();
        match self.run(request, server_context).await {
            Ok(response) => response,
            Err(err) => self.fatal(&method, started.elapsed(), &err),
        }
    }

    /// Renders an unclassified failure. Done hooks are skipped.
    fn fatal(&self, method: &Method, elapsed: Duration, err: &DaedalusError) -> Response {
        tracing::error!(error = %err, "request failed");
        let response = response::error(err, self.mask_errors);
        record_request(method.as_str(), response.status().as_u16(), elapsed);
        response
    }

    async fn run(
        &self,
        request: Request,
        server_context: &ServerContext,
    ) -> Result<Response, DaedalusError> {
        let (head, body) = request.into_parts();
        let mut done_hooks: Vec<OnRequestDone> = Vec::new();
        let mut ended: Option<Response> = None;

        for &index in &self.on_request {
            let plugin = &self.plugins[index];
            let payload = OnRequestPayload::new(&head, server_context, &mut ended);
            if let Some(hook) = plugin.on_request(payload).await? {
                done_hooks.push(hook);
            }
            if ended.is_some() {
                tracing::debug!(plugin = plugin.name(), "request ended early");
                break;
            }
        }

        let mut response = match ended {
            Some(response) => response,
            None => self.execute(head, body, server_context).await?,
        };

        for hook in done_hooks {
            hook(&mut response);
        }
        Ok(response)
    }

    async fn execute(
        &self,
        head: Parts,
        body: daedalus_core::Body,
        server_context: &ServerContext,
    ) -> Result<Response, DaedalusError> {
        let resolution = resolve_parser(
            self.on_request_parse
                .iter()
                .map(|&index| self.plugins[index].as_ref()),
            &head,
            server_context,
        );

        let parsed = resolution.parser.parse(&head, body).await;
        let params = match parsed {
            Ok(params) => params,
            Err(err) if err.is_classified() => {
                tracing::debug!(
                    parser = resolution.parser.name(),
                    error = %err,
                    "failed to parse request"
                );
                return Ok(response::error(&err, self.mask_errors));
            }
            Err(err) => return Err(err),
        };

        let mut payload = OnParamsPayload::new(params);
        for hook in resolution.params_hooks {
            hook(&mut payload);
        }

        let Parts {
            method,
            uri,
            headers,
            ..
        } = head;
        let initial = InitialContext::new(
            method,
            uri,
            headers,
            payload.into_params(),
            server_context.clone(),
        );
        let engine = self.envelop.get_enveloped(&initial);

        match self.processor.process(initial, engine).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_classified() => Ok(response::error(&err, self.mask_errors)),
            Err(err) => Err(err),
        }
    }

    /// Returns the names of the registered plugins, in order.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Returns the number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("plugins", &self.plugin_names())
            .field("on_request", &self.on_request)
            .field("on_request_parse", &self.on_request_parse)
            .field("mask_errors", &self.mask_errors)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Lifecycle`].
#[must_use]
pub struct LifecycleBuilder {
    plugins: Vec<BoxedPlugin>,
    envelop: Arc<dyn Envelop>,
    processor: Option<Arc<dyn RequestProcessor>>,
    mask_errors: bool,
}

impl LifecycleBuilder {
    /// Creates a builder with no plugins.
    #[must_use]
    pub fn new(envelop: Arc<dyn Envelop>) -> Self {
        Self {
            plugins: Vec::new(),
            envelop,
            processor: None,
            mask_errors: false,
        }
    }

    /// Appends a plugin.
    #[must_use]
    pub fn plugin<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Appends an already shared plugin.
    #[must_use]
    pub fn boxed_plugin(mut self, plugin: BoxedPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Appends several plugins, keeping their order.
    #[must_use]
    pub fn plugins(mut self, plugins: impl IntoIterator<Item = BoxedPlugin>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Replaces the default request processor.
    #[must_use]
    pub fn processor(mut self, processor: Arc<dyn RequestProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Masks unexpected error messages in responses.
    #[must_use]
    pub const fn mask_errors(mut self, mask: bool) -> Self {
        self.mask_errors = mask;
        self
    }

    /// Builds the lifecycle, caching which plugins implement which hooks.
    #[must_use]
    pub fn build(self) -> Lifecycle {
        let hooked = |pick: fn(&Capabilities) -> bool| -> Vec<usize> {
            self.plugins
                .iter()
                .enumerate()
                .filter(|(_, p)| pick(&p.capabilities()))
                .map(|(i, _)| i)
                .collect()
        };
        let on_request = hooked(|c| c.on_request);
        let on_request_parse = hooked(|c| c.on_request_parse);

        Lifecycle {
            on_request,
            on_request_parse,
            processor: self
                .processor
                .unwrap_or_else(|| Arc::new(DefaultProcessor::new(self.mask_errors))),
            plugins: self.plugins,
            envelop: self.envelop,
            mask_errors: self.mask_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, get, StubEngine};
    use daedalus_core::{body, BoxFuture, GraphQLParams};
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        end: bool,
        done: bool,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ON_REQUEST
        }

        fn on_request<'a>(
            &'a self,
            mut payload: OnRequestPayload<'a>,
        ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("request:{}", self.name));
                if self.end {
                    payload.end_response(response::empty(StatusCode::ACCEPTED));
                }
                if !self.done {
                    return Ok(None);
                }
                let log = Arc::clone(&self.log);
                let name = self.name;
                let hook: OnRequestDone = Box::new(move |response| {
                    log.lock()
                        .unwrap()
                        .push(format!("done:{name}:{}", response.status().as_u16()));
                });
                Ok(Some(hook))
            })
        }
    }

    fn recorder(name: &'static str, log: &Log, end: bool, done: bool) -> Recorder {
        Recorder {
            name,
            log: Arc::clone(log),
            end,
            done,
        }
    }

    struct FixedParser(&'static str);

    impl RequestParser for FixedParser {
        fn name(&self) -> &'static str {
            self.0
        }

        fn parse<'a>(
            &'a self,
            _head: &'a Parts,
            _body: daedalus_core::Body,
        ) -> BoxFuture<'a, Result<GraphQLParams, DaedalusError>> {
            let query = format!("{{ {} }}", self.0);
            Box::pin(async move { Ok(GraphQLParams::query(query)) })
        }
    }

    struct SetsParser(&'static str);

    impl Plugin for SetsParser {
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
            payload.set_request_parser(Arc::new(FixedParser(self.0)));
            None
        }
    }

    struct Undeclared(Arc<AtomicUsize>);

    impl Plugin for Undeclared {
        fn name(&self) -> &'static str {
            "undeclared"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }

        fn on_request<'a>(
            &'a self,
            _payload: OnRequestPayload<'a>,
        ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(None) })
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ON_REQUEST
        }

        fn on_request<'a>(
            &'a self,
            _payload: OnRequestPayload<'a>,
        ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
            Box::pin(async { Err(DaedalusError::readiness("peer mismatch")) })
        }
    }

    fn builder() -> LifecycleBuilder {
        Lifecycle::builder(Arc::new(StubEngine))
    }

    #[tokio::test]
    async fn test_end_response_short_circuits() {
        let log = Log::default();
        let lifecycle = builder()
            .plugin(recorder("a", &log, false, true))
            .plugin(recorder("b", &log, true, true))
            .plugin(recorder("c", &log, false, true))
            .build();

        let response = lifecycle
            .handle(get("/graphql?query={a}"), &ServerContext::new())
            .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["request:a", "request:b", "done:a:202", "done:b:202"]
        );
    }

    #[tokio::test]
    async fn test_done_hooks_see_executed_response() {
        let log = Log::default();
        let lifecycle = builder()
            .plugin(recorder("a", &log, false, true))
            .plugin(recorder("b", &log, false, false))
            .plugin(SetsParser("greetings"))
            .build();

        let response = lifecycle
            .handle(get("/graphql"), &ServerContext::new())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["request:a", "request:b", "done:a:200"]
        );
    }

    #[tokio::test]
    async fn test_last_parser_setter_wins() {
        let lifecycle = builder()
            .plugin(SetsParser("first"))
            .plugin(SetsParser("second"))
            .build();

        let response = lifecycle
            .handle(get("/graphql"), &ServerContext::new())
            .await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["query"], "{ second }");
    }

    #[test]
    fn test_resolve_parser_in_isolation() {
        let plugins: Vec<BoxedPlugin> = vec![
            Arc::new(SetsParser("first")),
            Arc::new(SetsParser("second")),
        ];
        let (head, _) = get("/graphql").into_parts();

        let resolution = resolve_parser(
            plugins.iter().map(|p| p.as_ref()),
            &head,
            &ServerContext::new(),
        );
        assert_eq!(resolution.parser.name(), "second");

        let none = resolve_parser(std::iter::empty(), &head, &ServerContext::new());
        assert_eq!(none.parser.name(), "noop");
    }

    #[tokio::test]
    async fn test_no_parser_yields_missing_query() {
        let lifecycle = builder().build();
        let response = lifecycle
            .handle(get("/graphql?query={a}"), &ServerContext::new())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["message"], "Must provide query string.");
    }

    #[tokio::test]
    async fn test_undeclared_hooks_are_not_called() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lifecycle = builder().plugin(Undeclared(Arc::clone(&calls))).build();

        lifecycle
            .handle(get("/graphql"), &ServerContext::new())
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fatal_fallback_skips_done_hooks() {
        let log = Log::default();
        let lifecycle = builder()
            .plugin(recorder("a", &log, false, true))
            .plugin(Failing)
            .build();

        let response = lifecycle
            .handle(get("/readiness"), &ServerContext::new())
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(*log.lock().unwrap(), vec!["request:a"]);
        let body = body_json(response).await;
        assert_eq!(
            body["errors"][0]["message"],
            "Readiness check failed: peer mismatch"
        );
    }

    #[test]
    fn test_fatal_fallback_is_counted() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let lifecycle = builder().build();

        let response = metrics::with_local_recorder(&recorder, || {
            lifecycle.fatal(
                &Method::GET,
                Duration::from_millis(5),
                &DaedalusError::readiness("peer mismatch"),
            )
        });

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let rendered = handle.render();
        let line = rendered
            .lines()
            .find(|line| line.starts_with("daedalus_requests_total{"))
            .unwrap();
        assert!(line.contains(r#"method="GET""#));
        assert!(line.contains(r#"status="500""#));
        assert!(line.ends_with(" 1"));
    }

    #[tokio::test]
    async fn test_params_hooks_replace_params() {
        struct Rewrite;

        impl Plugin for Rewrite {
            fn name(&self) -> &'static str {
                "rewrite"
            }

            fn capabilities(&self) -> Capabilities {
                Capabilities::ON_REQUEST_PARSE
            }

            fn on_request_parse(
                &self,
                _payload: &mut OnRequestParsePayload<'_>,
            ) -> Option<OnParamsHook> {
                Some(Box::new(|payload| {
                    assert_eq!(payload.params().query_text(), Some("{ original }"));
                    payload.set_params(GraphQLParams::query("{ rewritten }"));
                }))
            }
        }

        let lifecycle = builder()
            .plugin(SetsParser("original"))
            .plugin(Rewrite)
            .build();

        let body = body_json(
            lifecycle
                .handle(get("/graphql"), &ServerContext::new())
                .await,
        )
        .await;
        assert_eq!(body["data"]["query"], "{ rewritten }");
    }

    #[test]
    fn test_plugin_names_keep_order() {
        let log = Log::default();
        let lifecycle = builder()
            .plugin(recorder("x", &log, false, false))
            .plugin(SetsParser("y"))
            .build();
        assert_eq!(lifecycle.plugin_names(), vec!["x", "y"]);
        assert_eq!(lifecycle.plugin_count(), 2);
    }

    #[tokio::test]
    async fn test_request_body_reaches_parser() {
        let lifecycle = builder().plugin(SetsParser("z")).build();
        let request = http::Request::post("/graphql")
            .body(body::full("ignored"))
            .unwrap();
        let response = lifecycle.handle(request, &ServerContext::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
