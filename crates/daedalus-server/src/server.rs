//! The HTTP server.
//!
//! [`ServerBuilder`] assembles the request lifecycle from the built-in
//! plugins and the embedder's own, in this order:
//!
//! 1. telemetry (request id, span, metrics)
//! 2. CORS, when a policy is set
//! 3. health and readiness, when enabled
//! 4. endpoint guard
//! 5. request parsers
//! 6. embedder plugins
//!
//! [`Server::start`] binds the listener and returns a [`ServerHandle`];
//! [`ServerHandle::stop`] shuts the server down gracefully.
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus_server::{Server, ServerConfig};
//!
//! let handle = Server::builder()
//!     .config(ServerConfig::builder().http_addr("127.0.0.1:4000").build())
//!     .engine(engine)
//!     .build()?
//!     .start()
//!     .await?;
//!
//! // ...
//! handle.stop().await?;
//! ```

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::fetch::{Fetch, HyperFetch};
use crate::health::{
    HealthPlugin, ProbeTarget, DEFAULT_HEALTH_PATH, DEFAULT_READINESS_PATH,
};
use crate::identity::ServerIdentity;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use daedalus_core::{body, Engine, Envelop, ServerContext};
use daedalus_extract::{MultipartLimits, DEFAULT_MAX_BODY_SIZE};
use daedalus_middleware::plugins::{
    default_parser_plugins, CorsPlugin, CorsPolicy, EndpointPlugin, TelemetryPlugin,
};
use daedalus_middleware::{BoxedPlugin, Lifecycle, Plugin};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Default GraphQL endpoint path.
pub const DEFAULT_ENDPOINT: &str = "/graphql";

/// Paths served by the health plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPaths {
    /// Liveness path.
    pub health: String,
    /// Readiness path.
    pub readiness: String,
}

impl Default for HealthPaths {
    fn default() -> Self {
        Self {
            health: DEFAULT_HEALTH_PATH.to_string(),
            readiness: DEFAULT_READINESS_PATH.to_string(),
        }
    }
}

/// A configured, not yet running server.
pub struct Server {
    config: ServerConfig,
    lifecycle: Arc<Lifecycle>,
    server_context: Arc<ServerContext>,
    identity: ServerIdentity,
    probe_target: ProbeTarget,
}

impl Server {
    /// Creates a server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns the lifecycle requests are handled by.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Returns the context forwarded to every request.
    pub fn server_context(&self) -> &Arc<ServerContext> {
        &self.server_context
    }

    /// Returns this instance's identity.
    pub const fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Returns the listener configuration.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindError`] if the address is invalid or
    /// cannot be bound.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::BindError(format!("invalid address '{}': {e}", self.config.http_addr()))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("failed to bind {addr}: {e}")))?;
        self.start_with_listener(listener)
    }

    /// Starts accepting connections on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub fn start_with_listener(self, listener: TcpListener) -> Result<ServerHandle, ServerError> {
        let local_addr = listener.local_addr()?;
        self.probe_target.set(local_addr);
        let shutdown = ShutdownSignal::new();
        let identity = self.identity.clone();

        tracing::info!(addr = %local_addr, server_id = %identity, "server listening");
        let task = tokio::spawn(self.accept_loop(listener, shutdown.clone()));

        Ok(ServerHandle {
            local_addr,
            identity,
            shutdown,
            task,
        })
    }

    /// Runs until SIGTERM or SIGINT, then shuts down gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start.
    pub async fn run(self) -> Result<(), ServerError> {
        let handle = self.start().await?;
        ShutdownSignal::with_os_signals().recv().await;
        handle.stop().await
    }

    async fn accept_loop(self, listener: TcpListener, shutdown: ShutdownSignal) {
        let limit = self
            .config
            .max_connections()
            .map(|max| Arc::new(Semaphore::new(max)));
        let tracker = ConnectionTracker::new();
        let server = Arc::new(self);

        loop {
            let permit = tokio::select! {
                permit = acquire(limit.clone()) => permit,
                () = shutdown.recv() => break,
            };

            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to accept connection");
                        continue;
                    }
                },
                () = shutdown.recv() => break,
            };

            let server = Arc::clone(&server);
            let token = tracker.acquire();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = server.serve(stream, shutdown).await {
                    tracing::debug!(remote = %remote_addr, error = %err, "connection error");
                }
                drop(permit);
                drop(token);
            });
        }

        drop(listener);
        let timeout = server.config.shutdown_timeout();
        tracing::info!(
            open_connections = tracker.active_connections(),
            timeout_secs = timeout.as_secs(),
            "draining connections"
        );
        if tokio::time::timeout(timeout, tracker.drained()).await.is_err() {
            tracing::warn!(
                open_connections = tracker.active_connections(),
                "shutdown timeout reached"
            );
        }
        tracing::info!("server stopped");
    }

    async fn serve(
        self: Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move {
                let request = request.map(body::boxed);
                let response = server.lifecycle.handle(request, &server.server_context).await;
                Ok::<_, Infallible>(response)
            }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => result,
            () = shutdown.recv() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        }
    }
}

async fn acquire(limit: Option<Arc<Semaphore>>) -> Option<OwnedSemaphorePermit> {
    match limit {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("plugins", &self.lifecycle.plugin_names())
            .finish_non_exhaustive()
    }
}

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    identity: ServerIdentity,
    shutdown: ShutdownSignal,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Returns the bound address.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the server identity.
    pub const fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Returns a signal that stops the server when triggered.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Stops accepting connections, lets open ones finish up to the
    /// shutdown timeout, and waits for the server to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Task`] if the server task panicked.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        self.task
            .await
            .map_err(|e| ServerError::Task(e.to_string()))
    }
}

/// Builder for [`Server`].
#[must_use]
pub struct ServerBuilder {
    config: ServerConfig,
    envelop: Option<Arc<dyn Envelop>>,
    server_context: ServerContext,
    endpoint: String,
    mask_errors: bool,
    max_body_size: usize,
    multipart: Option<MultipartLimits>,
    cors: Option<CorsPolicy>,
    health: Option<HealthPaths>,
    fetch: Option<Arc<dyn Fetch>>,
    identity: Option<ServerIdentity>,
    plugins: Vec<BoxedPlugin>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: ServerConfig::default(),
            envelop: None,
            server_context: ServerContext::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            mask_errors: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            multipart: Some(MultipartLimits::default()),
            cors: Some(CorsPolicy::default()),
            health: Some(HealthPaths::default()),
            fetch: None,
            identity: None,
            plugins: Vec::new(),
        }
    }
}

impl ServerBuilder {
    /// Sets the listener configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `engine` for every request.
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.envelop = Some(Arc::new(engine));
        self
    }

    /// Asks `envelop` for the engine per request.
    pub fn envelop(mut self, envelop: Arc<dyn Envelop>) -> Self {
        self.envelop = Some(envelop);
        self
    }

    /// Sets the context forwarded to every request.
    pub fn server_context(mut self, server_context: ServerContext) -> Self {
        self.server_context = server_context;
        self
    }

    /// Sets the GraphQL endpoint path.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Masks unexpected error messages.
    pub const fn mask_errors(mut self, mask: bool) -> Self {
        self.mask_errors = mask;
        self
    }

    /// Caps request bodies.
    pub const fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Sets upload limits. `None` disables multipart uploads.
    pub const fn multipart(mut self, limits: Option<MultipartLimits>) -> Self {
        self.multipart = limits;
        self
    }

    /// Sets the CORS policy. `None` disables CORS handling.
    pub fn cors(mut self, policy: Option<CorsPolicy>) -> Self {
        self.cors = policy;
        self
    }

    /// Sets the health paths. `None` disables the health plugin.
    pub fn health(mut self, paths: Option<HealthPaths>) -> Self {
        self.health = paths;
        self
    }

    /// Replaces the client used by the readiness probe.
    pub fn fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Uses a fixed identity instead of minting one.
    pub fn identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Appends an embedder plugin. They run after the built-in plugins.
    pub fn plugin<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Appends an already shared embedder plugin.
    pub fn boxed_plugin(mut self, plugin: BoxedPlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Assembles the lifecycle and builds the server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MissingEngine`] if no engine was set.
    pub fn build(self) -> Result<Server, ServerError> {
        let envelop = self.envelop.ok_or(ServerError::MissingEngine)?;
        let identity = self.identity.unwrap_or_else(ServerIdentity::generate);
        let probe_target = ProbeTarget::new();

        let mut builder = Lifecycle::builder_with_envelop(envelop)
            .mask_errors(self.mask_errors)
            .plugin(TelemetryPlugin::new());
        if let Some(policy) = self.cors {
            builder = builder.plugin(CorsPlugin::new(policy));
        }
        if let Some(paths) = self.health {
            let fetch = self
                .fetch
                .unwrap_or_else(|| Arc::new(HyperFetch::new()) as Arc<dyn Fetch>);
            builder = builder.plugin(
                HealthPlugin::new(identity.clone(), fetch)
                    .with_paths(paths.health, paths.readiness)
                    .with_probe_target(probe_target.clone()),
            );
        }
        let lifecycle = builder
            .plugin(EndpointPlugin::new(self.endpoint))
            .plugins(default_parser_plugins(self.multipart, self.max_body_size))
            .plugins(self.plugins)
            .build();

        tracing::debug!(plugins = ?lifecycle.plugin_names(), "lifecycle assembled");

        Ok(Server {
            config: self.config,
            lifecycle: Arc::new(lifecycle),
            server_context: Arc::new(self.server_context),
            identity,
            probe_target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::{
        BoxFuture, ContextValue, Document, ExecutionArgs, ExecutionResult, GraphQLError,
        InitialContext, OperationKind, Schema,
    };
    use futures_util::stream::{self, BoxStream, StreamExt};
    use std::sync::OnceLock;

    struct NullEngine;

    impl Engine for NullEngine {
        fn schema(&self) -> &Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| Schema::new(()))
        }

        fn parse(&self, source: &str) -> Result<Document, Vec<GraphQLError>> {
            Ok(Document::new(source.to_string(), vec![(None, OperationKind::Query)]))
        }

        fn validate(&self, _schema: &Schema, _document: &Document) -> Vec<GraphQLError> {
            Vec::new()
        }

        fn execute(&self, _args: ExecutionArgs) -> BoxFuture<'_, ExecutionResult> {
            Box::pin(async { ExecutionResult::data(serde_json::json!({ "ok": true })) })
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

    #[test]
    fn test_build_requires_engine() {
        assert!(matches!(
            Server::builder().build(),
            Err(ServerError::MissingEngine)
        ));
    }

    #[test]
    fn test_plugin_order() {
        let server = Server::builder().engine(Arc::new(NullEngine)).build().unwrap();
        assert_eq!(
            server.lifecycle().plugin_names(),
            vec![
                "telemetry",
                "cors",
                "health",
                "endpoint",
                "get",
                "post-json",
                "post-form",
                "post-graphql",
                "multipart"
            ]
        );
    }

    #[test]
    fn test_optional_plugins_can_be_disabled() {
        let server = Server::builder()
            .engine(Arc::new(NullEngine))
            .cors(None)
            .health(None)
            .multipart(None)
            .build()
            .unwrap();
        let names = server.lifecycle().plugin_names();
        assert!(!names.contains(&"cors"));
        assert!(!names.contains(&"health"));
        assert!(!names.contains(&"multipart"));
    }

    #[tokio::test]
    async fn test_invalid_address_fails_to_start() {
        let server = Server::builder()
            .config(ServerConfig::builder().http_addr("nowhere").build())
            .engine(Arc::new(NullEngine))
            .build()
            .unwrap();
        assert!(matches!(server.start().await, Err(ServerError::BindError(_))));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let server = Server::builder()
            .config(ServerConfig::builder().http_addr("127.0.0.1:0").build())
            .engine(Arc::new(NullEngine))
            .build()
            .unwrap();
        let handle = server.start().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle.stop())
            .await
            .unwrap()
            .unwrap();
    }
}
