//! Server and request context types.
//!
//! [`ServerContext`] is supplied once by the embedder and shared by every
//! request. [`InitialContext`] is assembled per request once parameters are
//! final; it is what the engine collaborator and the request processor see.

use crate::params::GraphQLParams;
use http::{HeaderMap, Method, Uri};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Typed values shared by all requests of one server.
///
/// # Example
///
/// ```
/// use daedalus_core::ServerContext;
///
/// struct Database(&'static str);
///
/// let mut ctx = ServerContext::new();
/// ctx.insert(Database("primary"));
/// assert_eq!(ctx.get::<Database>().unwrap().0, "primary");
/// ```
#[derive(Clone, Default)]
pub struct ServerContext {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServerContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Gets a value by type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("len", &self.values.len())
            .finish()
    }
}

/// The request head, the final parameters and the server context.
///
/// Built after all parameter hooks ran; from here on the parameters are
/// frozen.
#[derive(Debug, Clone)]
pub struct InitialContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: GraphQLParams,
    server: ServerContext,
}

impl InitialContext {
    /// Creates a new initial context.
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: GraphQLParams,
        server: ServerContext,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            params,
            server,
        }
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the frozen parameters.
    pub const fn params(&self) -> &GraphQLParams {
        &self.params
    }

    /// Returns the server context.
    pub const fn server_context(&self) -> &ServerContext {
        &self.server
    }
}
