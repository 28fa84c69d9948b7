//! # Daedalus
//!
//! A GraphQL-over-HTTP server pipeline. Requests pass through an ordered list
//! of plugins that can answer early, choose how the body is parsed and
//! rewrite the parsed parameters before the engine runs.
//!
//! Out of the box the server handles:
//!
//! - `GET` query strings and `POST` JSON, form and `application/graphql` bodies
//! - `multipart/form-data` file uploads with size and count limits
//! - CORS preflights and response headers
//! - `/health` and a `/readiness` probe that calls the server's own health endpoint
//!
//! The GraphQL engine itself is supplied by the caller through
//! [`Engine`](daedalus_core::Engine).
//!
//! ## Example
//!
//! ```rust,ignore
//! use daedalus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("daedalus.toml")?
//!         .with_env_prefix(daedalus::config::ENV_PREFIX)
//!         .load()?;
//!
//!     daedalus::run(config, Arc::new(MyEngine::new())).await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::Context;
use std::sync::Arc;

// Re-export core types
pub use daedalus_core as core;

// Re-export request parsers
pub use daedalus_extract as extract;

// Re-export the lifecycle and plugins
pub use daedalus_middleware as middleware;

// Re-export server types
pub use daedalus_server as server;

// Re-export configuration
pub use daedalus_config as config;

// Re-export logging and metrics
pub use daedalus_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use daedalus::prelude::*;
/// ```
pub mod prelude {
    pub use daedalus_core::{
        BoxFuture, DaedalusError, Document, Engine, Envelop, ExecutionArgs, ExecutionResult,
        GraphQLError, GraphQLParams, InitialContext, OperationKind, Query, Request,
        RequestParser, Response, Schema, ServerContext, UploadRef, Value,
    };

    pub use daedalus_extract::MultipartLimits;

    pub use daedalus_middleware::plugins::{AllowedOrigins, CorsPolicy};
    pub use daedalus_middleware::{
        Capabilities, Lifecycle, OnParamsHook, OnParamsPayload, OnRequestDone,
        OnRequestParsePayload, OnRequestPayload, Plugin,
    };

    pub use daedalus_server::{HealthPaths, Server, ServerConfig, ServerHandle};

    pub use daedalus_config::{ConfigLoader, DaedalusConfig};

    pub use std::sync::Arc;
}

/// Runs a server for `engine` until the process receives a shutdown signal.
///
/// Logging and the metrics recorder are installed from `config` first.
///
/// # Errors
///
/// Fails if telemetry cannot be installed, the server cannot be built or
/// bound, or shutdown does not complete cleanly.
pub async fn run(
    config: config::DaedalusConfig,
    engine: Arc<dyn core::Engine>,
) -> anyhow::Result<()> {
    telemetry::init_logging(&config.logging.to_log_config())
        .context("failed to initialize logging")?;
    telemetry::init_metrics(&telemetry::MetricsConfig::default())
        .context("failed to initialize metrics")?;

    let server = config
        .server_builder()
        .engine(engine)
        .build()
        .context("failed to build server")?;

    tracing::info!(
        addr = %config.server.http_addr,
        endpoint = %config.graphql.endpoint,
        server_id = %server.identity(),
        "starting daedalus"
    );

    server.run().await.context("server stopped with an error")
}
