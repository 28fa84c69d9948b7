//! The external GraphQL execution collaborator.
//!
//! Daedalus does not implement the GraphQL language. It consumes an
//! [`Engine`] that can parse, validate, execute and subscribe, and an
//! [`Envelop`] that hands out an engine seeded with the per-request context.
//!
//! # Example
//!
//! ```ignore
//! use daedalus_core::engine::{Engine, Envelop};
//! use std::sync::Arc;
//!
//! let engine: Arc<dyn Engine> = Arc::new(MyEngine::new(schema));
//! let envelop: Arc<dyn Envelop> = Arc::new(engine);
//! ```

use crate::body::BoxFuture;
use crate::context::InitialContext;
use crate::error::GraphQLError;
use crate::value::Value;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque per-request context value produced by [`Engine::context_factory`].
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// The kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A read operation.
    Query,
    /// A write operation.
    Mutation,
    /// A long-lived event stream.
    Subscription,
}

impl OperationKind {
    /// Returns the keyword used in GraphQL source.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque schema value owned by the engine.
#[derive(Clone)]
pub struct Schema(Arc<dyn Any + Send + Sync>);

impl Schema {
    /// Wraps an engine-specific schema.
    pub fn new<T: Any + Send + Sync>(schema: T) -> Self {
        Self(Arc::new(schema))
    }

    /// Borrows the engine-specific schema.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Schema(..)")
    }
}

/// A parsed GraphQL document.
///
/// The syntax tree itself is engine-specific. The pipeline only needs to know
/// which operations the document defines, so the engine lists them here.
#[derive(Clone)]
pub struct Document {
    operations: Vec<(Option<String>, OperationKind)>,
    ast: Arc<dyn Any + Send + Sync>,
}

impl Document {
    /// Wraps an engine-specific syntax tree.
    pub fn new<T: Any + Send + Sync>(
        ast: T,
        operations: Vec<(Option<String>, OperationKind)>,
    ) -> Self {
        Self {
            operations,
            ast: Arc::new(ast),
        }
    }

    /// Borrows the engine-specific syntax tree.
    pub fn ast<T: Any>(&self) -> Option<&T> {
        self.ast.downcast_ref()
    }

    /// Resolves the kind of the operation that would run.
    ///
    /// With a name, the matching operation is chosen. Without one, the
    /// document must hold exactly one operation.
    pub fn operation_kind(&self, operation_name: Option<&str>) -> Option<OperationKind> {
        match operation_name {
            Some(name) => self
                .operations
                .iter()
                .find(|(n, _)| n.as_deref() == Some(name))
                .map(|(_, kind)| *kind),
            None if self.operations.len() == 1 => Some(self.operations[0].1),
            None => None,
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// Arguments for [`Engine::execute`] and [`Engine::subscribe`].
#[derive(Debug, Clone)]
pub struct ExecutionArgs {
    /// The schema to execute against.
    pub schema: Schema,
    /// The validated document.
    pub document: Document,
    /// Coerced variables, possibly holding uploads.
    pub variables: IndexMap<String, Value>,
    /// The selected operation.
    pub operation_name: Option<String>,
    /// The value produced by [`Engine::context_factory`].
    pub context: ContextValue,
}

/// The outcome of executing one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Result data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Errors raised while executing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    /// Protocol extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ExecutionResult {
    /// Creates a successful result.
    #[must_use]
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Creates a result with only errors.
    #[must_use]
    pub fn errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }
}

/// The GraphQL engine used to run operations.
pub trait Engine: Send + Sync + 'static {
    /// Returns the schema.
    fn schema(&self) -> &Schema;

    /// Parses query source into a document.
    fn parse(&self, source: &str) -> Result<Document, Vec<GraphQLError>>;

    /// Validates a document against the schema. An empty list means valid.
    fn validate(&self, schema: &Schema, document: &Document) -> Vec<GraphQLError>;

    /// Executes a query or mutation.
    fn execute(&self, args: ExecutionArgs) -> BoxFuture<'_, ExecutionResult>;

    /// Starts a subscription.
    ///
    /// Returns the event stream, or a single result if the subscription
    /// could not be created.
    fn subscribe(
        &self,
        args: ExecutionArgs,
    ) -> BoxFuture<'_, Result<BoxStream<'static, ExecutionResult>, ExecutionResult>>;

    /// Builds the per-request context value.
    fn context_factory(&self, initial: &InitialContext) -> ContextValue;
}

/// Supplies an engine for one request.
pub trait Envelop: Send + Sync + 'static {
    /// Returns the engine seeded with the request's initial context.
    fn get_enveloped(&self, initial: &InitialContext) -> Arc<dyn Engine>;
}

impl Envelop for Arc<dyn Engine> {
    fn get_enveloped(&self, _initial: &InitialContext) -> Arc<dyn Engine> {
        Arc::clone(self)
    }
}
