//! The plugin trait and hook payloads.
//!
//! A [`Plugin`] takes part in the request lifecycle through two hooks:
//!
//! - [`on_request`](Plugin::on_request) runs before parsing. It may end the
//!   request early with [`OnRequestPayload::end_response`] and may return an
//!   [`OnRequestDone`] hook that sees the final response.
//! - [`on_request_parse`](Plugin::on_request_parse) runs while the parser is
//!   being chosen. It may install a parser and may return an [`OnParamsHook`]
//!   that sees (and may replace) the parsed parameters.
//!
//! A plugin declares which hooks it implements through
//! [`capabilities`](Plugin::capabilities). The lifecycle reads this once at
//! construction and only dispatches to declared hooks.
//!
//! # Example
//!
//! ```ignore
//! use daedalus_middleware::{Capabilities, OnRequestDone, OnRequestPayload, Plugin};
//! use daedalus_core::{BoxFuture, DaedalusError};
//!
//! struct PoweredBy;
//!
//! impl Plugin for PoweredBy {
//!     fn name(&self) -> &'static str {
//!         "powered-by"
//!     }
//!
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::ON_REQUEST
//!     }
//!
//!     fn on_request<'a>(
//!         &'a self,
//!         _payload: OnRequestPayload<'a>,
//!     ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
//!         Box::pin(async {
//!             let done: OnRequestDone = Box::new(|response| {
//!                 response
//!                     .headers_mut()
//!                     .insert("x-powered-by", http::HeaderValue::from_static("daedalus"));
//!             });
//!             Ok(Some(done))
//!         })
//!     }
//! }
//! ```

use daedalus_core::{
    BoxFuture, DaedalusError, GraphQLParams, NoopParser, RequestParser, Response, ServerContext,
};
use http::request::Parts;
use std::fmt;
use std::sync::Arc;

/// Runs against the final response of a request.
pub type OnRequestDone = Box<dyn FnOnce(&mut Response) + Send>;

/// Runs against the parsed parameters of a request.
pub type OnParamsHook = Box<dyn FnOnce(&mut OnParamsPayload) + Send>;

/// The lifecycle hooks a plugin implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// The plugin implements [`Plugin::on_request`].
    pub on_request: bool,
    /// The plugin implements [`Plugin::on_request_parse`].
    pub on_request_parse: bool,
}

impl Capabilities {
    /// No hooks.
    pub const NONE: Self = Self {
        on_request: false,
        on_request_parse: false,
    };

    /// Only [`Plugin::on_request`].
    pub const ON_REQUEST: Self = Self {
        on_request: true,
        on_request_parse: false,
    };

    /// Only [`Plugin::on_request_parse`].
    pub const ON_REQUEST_PARSE: Self = Self {
        on_request: false,
        on_request_parse: true,
    };

    /// Both hooks.
    pub const ALL: Self = Self {
        on_request: true,
        on_request_parse: true,
    };
}

/// A participant in the request lifecycle.
pub trait Plugin: Send + Sync + 'static {
    /// Returns the plugin name, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the hooks this plugin implements.
    fn capabilities(&self) -> Capabilities;

    /// Runs before the request is parsed.
    ///
    /// Returning `Err` skips straight to the fatal fallback.
    fn on_request<'a>(
        &'a self,
        payload: OnRequestPayload<'a>,
    ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
        let _ = payload;
        Box::pin(async { Ok(None) })
    }

    /// Runs while the request parser is being chosen.
    fn on_request_parse(&self, payload: &mut OnRequestParsePayload<'_>) -> Option<OnParamsHook> {
        let _ = payload;
        None
    }
}

/// Input to [`Plugin::on_request`].
pub struct OnRequestPayload<'a> {
    head: &'a Parts,
    server_context: &'a ServerContext,
    response: &'a mut Option<Response>,
}

impl<'a> OnRequestPayload<'a> {
    pub(crate) fn new(
        head: &'a Parts,
        server_context: &'a ServerContext,
        response: &'a mut Option<Response>,
    ) -> Self {
        Self {
            head,
            server_context,
            response,
        }
    }

    /// Returns the request head.
    pub const fn request(&self) -> &Parts {
        self.head
    }

    /// Returns the server context.
    pub const fn server_context(&self) -> &ServerContext {
        self.server_context
    }

    /// Ends the request with `response`.
    ///
    /// No later `on_request` hook runs. Completion hooks still do.
    pub fn end_response(&mut self, response: Response) {
        *self.response = Some(response);
    }

    /// Returns `true` once [`end_response`](Self::end_response) was called.
    pub const fn has_ended(&self) -> bool {
        self.response.is_some()
    }
}

impl fmt::Debug for OnRequestPayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnRequestPayload")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("ended", &self.response.is_some())
            .finish()
    }
}

/// Input to [`Plugin::on_request_parse`].
pub struct OnRequestParsePayload<'a> {
    head: &'a Parts,
    server_context: &'a ServerContext,
    parser: Arc<dyn RequestParser>,
}

impl<'a> OnRequestParsePayload<'a> {
    /// Creates a payload whose active parser is the no-op parser.
    pub fn new(head: &'a Parts, server_context: &'a ServerContext) -> Self {
        Self {
            head,
            server_context,
            parser: Arc::new(NoopParser),
        }
    }

    /// Returns the request head.
    pub const fn request(&self) -> &Parts {
        self.head
    }

    /// Returns the server context.
    pub const fn server_context(&self) -> &ServerContext {
        self.server_context
    }

    /// Returns the currently active parser.
    pub fn request_parser(&self) -> &Arc<dyn RequestParser> {
        &self.parser
    }

    /// Replaces the active parser for later plugins and for parsing.
    pub fn set_request_parser(&mut self, parser: Arc<dyn RequestParser>) {
        self.parser = parser;
    }

    pub(crate) fn into_parser(self) -> Arc<dyn RequestParser> {
        self.parser
    }
}

impl fmt::Debug for OnRequestParsePayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnRequestParsePayload")
            .field("parser", &self.parser.name())
            .finish_non_exhaustive()
    }
}

/// Input to an [`OnParamsHook`].
#[derive(Debug)]
pub struct OnParamsPayload {
    params: GraphQLParams,
}

impl OnParamsPayload {
    pub(crate) const fn new(params: GraphQLParams) -> Self {
        Self { params }
    }

    /// Returns the current parameters.
    pub const fn params(&self) -> &GraphQLParams {
        &self.params
    }

    /// Replaces the parameters for later hooks and for execution.
    pub fn set_params(&mut self, params: GraphQLParams) {
        self.params = params;
    }

    pub(crate) fn into_params(self) -> GraphQLParams {
        self.params
    }
}
