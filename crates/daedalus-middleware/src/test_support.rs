//! Shared fixtures for unit tests.

use daedalus_core::body::{self, to_bytes};
use daedalus_core::{
    BoxFuture, ContextValue, Document, Engine, ExecutionArgs, ExecutionResult, GraphQLError,
    InitialContext, OperationKind, Request, Response, Schema,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, OnceLock};

/// Echoes the query text back as `data.query`.
pub struct StubEngine;

fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema::new("stub"))
}

impl Engine for StubEngine {
    fn schema(&self) -> &Schema {
        schema()
    }

    fn parse(&self, source: &str) -> Result<Document, Vec<GraphQLError>> {
        if source.contains("{{") {
            return Err(vec![GraphQLError::new("Syntax Error: Unexpected \"{\".")]);
        }
        let kind = if source.starts_with("mutation") {
            OperationKind::Mutation
        } else if source.starts_with("subscription") {
            OperationKind::Subscription
        } else {
            OperationKind::Query
        };
        Ok(Document::new(source.to_string(), vec![(None, kind)]))
    }

    fn validate(&self, _schema: &Schema, document: &Document) -> Vec<GraphQLError> {
        match document.ast::<String>() {
            Some(source) if source.contains("unknownField") => vec![GraphQLError::new(
                "Cannot query field \"unknownField\" on type \"Query\".",
            )],
            _ => Vec::new(),
        }
    }

    fn execute(&self, args: ExecutionArgs) -> BoxFuture<'_, ExecutionResult> {
        Box::pin(async move {
            let query = args.document.ast::<String>().cloned().unwrap_or_default();
            if query.contains("boom") {
                return ExecutionResult {
                    data: None,
                    errors: vec![GraphQLError::new("resolver exploded")],
                    extensions: None,
                };
            }
            let variables = daedalus_core::Value::Object(args.variables).into_json();
            ExecutionResult::data(serde_json::json!({"query": query, "variables": variables}))
        })
    }

    fn subscribe(
        &self,
        _args: ExecutionArgs,
    ) -> BoxFuture<'_, Result<BoxStream<'static, ExecutionResult>, ExecutionResult>> {
        Box::pin(async {
            Ok(stream::iter([1, 2])
                .map(|n| ExecutionResult::data(serde_json::json!({"count": n})))
                .boxed())
        })
    }

    fn context_factory(&self, _initial: &InitialContext) -> ContextValue {
        Arc::new(())
    }
}

/// Builds a GET request with an empty body.
pub fn get(uri: &str) -> Request {
    http::Request::get(uri).body(body::empty()).unwrap()
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Reads a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
