//! # Daedalus Server
//!
//! HTTP/1.1 server for the Daedalus GraphQL pipeline, built on Hyper and
//! Tokio.
//!
//! - [`Server`] / [`ServerBuilder`] assemble the request lifecycle and serve it
//! - [`ServerHandle`] stops a running server gracefully
//! - [`HealthPlugin`] serves `/health` and the `/readiness` self-probe
//! - [`Fetch`] / [`HyperFetch`] issue the probe's outbound request
//!
//! ## Example
//!
//! ```rust,ignore
//! use daedalus_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), daedalus_server::ServerError> {
//!     Server::builder().engine(engine).build()?.run().await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
pub mod fetch;
pub mod health;
mod identity;
mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_SHUTDOWN_TIMEOUT_SECS};
pub use error::ServerError;
pub use fetch::{Fetch, FetchResponse, HyperFetch};
pub use health::{HealthPlugin, ProbeTarget};
pub use identity::{ServerIdentity, SERVER_ID_HEADER};
pub use server::{HealthPaths, Server, ServerBuilder, ServerHandle, DEFAULT_ENDPOINT};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
