//! Request parser plugins.
//!
//! Each [`ParserPlugin`] wraps one [`ParseStrategy`] and installs it when the
//! strategy accepts the request. Registration order decides ties: a later
//! matching plugin replaces the parser an earlier one installed.

use crate::lifecycle::BoxedPlugin;
use crate::plugin::{Capabilities, OnParamsHook, OnRequestParsePayload, Plugin};
use daedalus_extract::{
    FormParser, GraphQLBodyParser, JsonParser, MultipartLimits, MultipartParser, ParseStrategy,
    QueryStringParser,
};
use std::sync::Arc;

/// Installs a parse strategy for the requests it accepts.
#[derive(Debug)]
pub struct ParserPlugin<S> {
    strategy: Arc<S>,
}

impl<S: ParseStrategy> ParserPlugin<S> {
    /// Wraps `strategy`.
    #[must_use]
    pub fn new(strategy: S) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }
}

impl<S: ParseStrategy> Plugin for ParserPlugin<S> {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ON_REQUEST_PARSE
    }

    fn on_request_parse(&self, payload: &mut OnRequestParsePayload<'_>) -> Option<OnParamsHook> {
        if self.strategy.accepts(payload.request()) {
            payload.set_request_parser(self.strategy.clone());
        }
        None
    }
}

/// Returns the built-in parser plugins in registration order.
///
/// Passing `None` for `multipart` disables upload support.
pub fn default_parser_plugins(
    multipart: Option<MultipartLimits>,
    max_body_size: usize,
) -> Vec<BoxedPlugin> {
    let mut plugins: Vec<BoxedPlugin> = vec![
        Arc::new(ParserPlugin::new(QueryStringParser)),
        Arc::new(ParserPlugin::new(JsonParser::new(max_body_size))),
        Arc::new(ParserPlugin::new(FormParser::new(max_body_size))),
        Arc::new(ParserPlugin::new(GraphQLBodyParser::new(max_body_size))),
    ];
    if let Some(limits) = multipart {
        plugins.push(Arc::new(ParserPlugin::new(MultipartParser::new(
            limits.body_size(max_body_size),
        ))));
    }
    plugins
}
