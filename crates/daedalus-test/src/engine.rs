//! A scriptable engine for pipeline tests.

use daedalus_core::{
    BoxFuture, ContextValue, Document, Engine, ExecutionArgs, ExecutionResult, GraphQLError,
    InitialContext, OperationKind, Schema, ServerContext, Value,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use http::{HeaderMap, Method};
use std::any::Any;
use parking_lot::Mutex;
use std::sync::Arc;

type Handler = Arc<dyn Fn(&RecordedCall) -> ExecutionResult + Send + Sync>;

enum Responder {
    Fixed(ExecutionResult),
    Echo,
    Handler(Handler),
}

/// An operation the engine was asked to run.
#[derive(Clone)]
pub struct RecordedCall {
    /// Query source.
    pub query: String,
    /// Requested operation name.
    pub operation_name: Option<String>,
    /// Kind of the operation that ran.
    pub kind: OperationKind,
    /// Variables as received, uploads included.
    pub variables: Value,
    /// Method of the HTTP request.
    pub method: Method,
    /// Headers of the HTTP request.
    pub headers: HeaderMap,
    /// Server context of the request.
    pub server_context: ServerContext,
}

impl RecordedCall {
    /// Returns a value from the request's server context.
    pub fn server_value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.server_context.get::<T>()
    }
}

/// Shared log of [`RecordedCall`]s.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    fn push(&self, call: RecordedCall) {
        self.0.lock().push(call);
    }

    /// Returns every recorded call.
    pub fn all(&self) -> Vec<RecordedCall> {
        self.0.lock().clone()
    }

    /// Returns the most recent call.
    pub fn last(&self) -> Option<RecordedCall> {
        self.0.lock().last().cloned()
    }

    /// Returns the number of recorded calls.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Returns `true` if nothing ran.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MockContext {
    method: Method,
    headers: HeaderMap,
    server_context: ServerContext,
}

/// A GraphQL engine whose answers are scripted by the test.
///
/// Query text is only scanned for its top-level operations: the keyword
/// (`query`, `mutation`, `subscription`, or none for a query) and the name
/// after it.
///
/// ```ignore
/// let engine = MockEngine::new()
///     .respond_with(ExecutionResult::data(json!({"hello": "world"})));
/// let calls = engine.calls();
/// ```
#[must_use]
pub struct MockEngine {
    schema: Schema,
    responder: Responder,
    parse_errors: Option<Vec<GraphQLError>>,
    validation_errors: Vec<GraphQLError>,
    events: Vec<ExecutionResult>,
    calls: CallLog,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Creates an engine answering `{"data": null}`.
    pub fn new() -> Self {
        Self {
            schema: Schema::new("mock"),
            responder: Responder::Fixed(ExecutionResult::data(serde_json::Value::Null)),
            parse_errors: None,
            validation_errors: Vec::new(),
            events: Vec::new(),
            calls: CallLog::default(),
        }
    }

    /// Creates an engine answering `{"data": {"query": …, "variables": …}}`.
    ///
    /// Uploads in the variables are echoed as their text.
    pub fn echo() -> Self {
        Self {
            responder: Responder::Echo,
            ..Self::new()
        }
    }

    /// Answers every operation with `result`.
    pub fn respond_with(mut self, result: ExecutionResult) -> Self {
        self.responder = Responder::Fixed(result);
        self
    }

    /// Answers every operation by calling `handler`.
    pub fn respond_with_fn<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RecordedCall) -> ExecutionResult + Send + Sync + 'static,
    {
        self.responder = Responder::Handler(Arc::new(handler));
        self
    }

    /// Fails parsing with `message`.
    pub fn fail_parse(mut self, message: impl Into<String>) -> Self {
        self.parse_errors = Some(vec![GraphQLError::new(message)]);
        self
    }

    /// Fails validation with `message`.
    pub fn fail_validation(mut self, message: impl Into<String>) -> Self {
        self.validation_errors.push(GraphQLError::new(message));
        self
    }

    /// Emits `events` for subscriptions.
    pub fn with_events(mut self, events: impl IntoIterator<Item = ExecutionResult>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    /// Returns a handle to the calls this engine receives.
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn record(&self, args: ExecutionArgs, kind: OperationKind) -> RecordedCall {
        let query = args.document.ast::<String>().cloned().unwrap_or_default();
        let (method, headers, server_context) = match args.context.downcast_ref::<MockContext>() {
            Some(ctx) => (
                ctx.method.clone(),
                ctx.headers.clone(),
                ctx.server_context.clone(),
            ),
            None => (Method::POST, HeaderMap::new(), ServerContext::new()),
        };
        let call = RecordedCall {
            query,
            operation_name: args.operation_name,
            kind,
            variables: Value::Object(args.variables),
            method,
            headers,
            server_context,
        };
        self.calls.push(call.clone());
        call
    }

    fn answer(&self, call: &RecordedCall) -> ExecutionResult {
        match &self.responder {
            Responder::Fixed(result) => result.clone(),
            Responder::Handler(handler) => handler(call),
            Responder::Echo => ExecutionResult::data(serde_json::json!({
                "query": call.query,
                "variables": echo_value(&call.variables),
            })),
        }
    }
}

fn echo_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Upload(upload) => upload
            .text()
            .map_or(serde_json::Value::Null, |text| text.into()),
        Value::List(items) => items.iter().map(echo_value).collect(),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), echo_value(v)))
                .collect(),
        ),
        other => other.clone().into_json(),
    }
}

/// Lists the top-level operations of `source`.
fn operations(source: &str) -> Vec<(Option<String>, OperationKind)> {
    let mut found = Vec::new();
    let mut depth = 0_usize;
    let mut parens = 0_usize;
    let mut pending: Option<OperationKind> = None;
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '{' => {
                if depth == 0 {
                    found.push((None, pending.take().unwrap_or(OperationKind::Query)));
                }
                depth += 1;
            }
            '}' => depth = depth.saturating_sub(1),
            '(' => parens += 1,
            ')' => parens = parens.saturating_sub(1),
            c if depth == 0 && parens == 0 && (c.is_alphabetic() || c == '_') => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !(next.is_alphanumeric() || next == '_') {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let word = &source[start..end];
                match (word, pending) {
                    ("query", None) => pending = Some(OperationKind::Query),
                    ("mutation", None) => pending = Some(OperationKind::Mutation),
                    ("subscription", None) => pending = Some(OperationKind::Subscription),
                    ("fragment", None) => {
                        skip_to_selection(&mut chars);
                        depth = 1;
                    }
                    (name, Some(kind)) => {
                        found.push((Some(name.to_string()), kind));
                        pending = None;
                        skip_to_selection(&mut chars);
                        depth = 1;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    found
}

fn skip_to_selection(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    for (_, c) in chars.by_ref() {
        if c == '{' {
            return;
        }
    }
}

impl Engine for MockEngine {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn parse(&self, source: &str) -> Result<Document, Vec<GraphQLError>> {
        if let Some(errors) = &self.parse_errors {
            return Err(errors.clone());
        }
        Ok(Document::new(source.to_string(), operations(source)))
    }

    fn validate(&self, _schema: &Schema, _document: &Document) -> Vec<GraphQLError> {
        self.validation_errors.clone()
    }

    fn execute(&self, args: ExecutionArgs) -> BoxFuture<'_, ExecutionResult> {
        Box::pin(async move {
            let kind = args
                .document
                .operation_kind(args.operation_name.as_deref())
                .unwrap_or(OperationKind::Query);
            let call = self.record(args, kind);
            self.answer(&call)
        })
    }

    fn subscribe(
        &self,
        args: ExecutionArgs,
    ) -> BoxFuture<'_, Result<BoxStream<'static, ExecutionResult>, ExecutionResult>> {
        Box::pin(async move {
            self.record(args, OperationKind::Subscription);
            Ok(stream::iter(self.events.clone()).boxed())
        })
    }

    fn context_factory(&self, initial: &InitialContext) -> ContextValue {
        Arc::new(MockContext {
            method: initial.method().clone(),
            headers: initial.headers().clone(),
            server_context: initial.server_context().clone(),
        })
    }
}
