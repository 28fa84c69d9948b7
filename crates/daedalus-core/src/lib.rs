//! # Daedalus Core
//!
//! Core types and collaborator traits for the Daedalus GraphQL server.
//!
//! This crate provides the foundational types used throughout Daedalus:
//!
//! - [`GraphQLParams`] - The normalized shape of a GraphQL request
//! - [`Value`] / [`UploadRef`] - Ordered JSON-like values that may carry uploads
//! - [`DaedalusError`] - The error taxonomy and its HTTP mapping
//! - [`Engine`] / [`Envelop`] - The external GraphQL execution collaborator
//! - [`RequestParser`] - Turns a raw request into [`GraphQLParams`]
//! - [`ServerContext`] / [`InitialContext`] - Per-server and per-request context

#![doc(html_root_url = "https://docs.rs/daedalus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod body;
mod context;
pub mod engine;
mod error;
mod params;
mod parser;
mod upload;
mod value;

pub use body::{Body, BoxError, BoxFuture, Request, Response};
pub use context::{InitialContext, ServerContext};
pub use engine::{
    ContextValue, Document, Engine, Envelop, ExecutionArgs, ExecutionResult, OperationKind,
    Schema,
};
pub use error::{DaedalusError, DaedalusResult, ErrorResponse, GraphQLError, MultipartLimit};
pub use params::{GraphQLParams, Query};
pub use parser::{NoopParser, RequestParser};
pub use upload::UploadRef;
pub use value::Value;
