//! # Daedalus Middleware
//!
//! The request lifecycle of the Daedalus GraphQL server.
//!
//! A [`Lifecycle`] owns an ordered list of [`Plugin`]s and drives every
//! request through the same phases:
//!
//! ```text
//! Request → on_request hooks ──(end_response)──────────────┐
//!              │                                            │
//!              ▼                                            │
//!        parser selection → parse → params hooks            │
//!              │                                            │
//!              ▼                                            │
//!        envelop → processor (parse / validate / execute)   │
//!              │                                            ▼
//! Response ← done hooks ←───────────────────────────────────┘
//! ```
//!
//! Plugins declare the hooks they implement through [`Capabilities`]; the
//! lifecycle reads them once when it is built.
//!
//! ## Example
//!
//! ```ignore
//! use daedalus_middleware::plugins::{default_parser_plugins, CorsPlugin, CorsPolicy};
//! use daedalus_middleware::Lifecycle;
//!
//! let lifecycle = Lifecycle::builder(engine)
//!     .plugin(CorsPlugin::new(CorsPolicy::default()))
//!     .plugins(default_parser_plugins(Some(MultipartLimits::default()), 1 << 20))
//!     .build();
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod lifecycle;
mod plugin;
pub mod plugins;
mod process;
pub mod response;

#[cfg(test)]
mod test_support;

pub use lifecycle::{resolve_parser, BoxedPlugin, Lifecycle, LifecycleBuilder, ParserResolution};
pub use plugin::{
    Capabilities, OnParamsHook, OnParamsPayload, OnRequestDone, OnRequestParsePayload,
    OnRequestPayload, Plugin,
};
pub use process::{process_request, DefaultProcessor, RequestProcessor};
