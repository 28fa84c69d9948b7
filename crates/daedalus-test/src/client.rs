//! In-memory client driving a request lifecycle.

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;
use daedalus_core::{Engine, Request, Response, ServerContext};
use daedalus_extract::{MultipartLimits, DEFAULT_MAX_BODY_SIZE};
use daedalus_middleware::plugins::default_parser_plugins;
use daedalus_middleware::Lifecycle;
use daedalus_server::Server;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::sync::Arc;

/// Sends requests straight into a [`Lifecycle`] without binding a port.
///
/// # Example
///
/// ```ignore
/// use daedalus_test::{MockEngine, TestClient};
///
/// let server = Server::builder().engine(Arc::new(MockEngine::echo())).build()?;
/// let client = TestClient::from_server(&server);
///
/// client
///     .get("/graphql")
///     .query(&[("query", "{ hello }")])
///     .send()
///     .await
///     .assert_status(StatusCode::OK);
/// ```
#[must_use]
pub struct TestClient {
    lifecycle: Arc<Lifecycle>,
    server_context: Arc<ServerContext>,
    default_headers: HeaderMap,
}

impl TestClient {
    /// Creates a client for `lifecycle` with an empty server context.
    pub fn new(lifecycle: impl Into<Arc<Lifecycle>>) -> Self {
        Self {
            lifecycle: lifecycle.into(),
            server_context: Arc::new(ServerContext::new()),
            default_headers: HeaderMap::new(),
        }
    }

    /// Creates a client sharing a built server's lifecycle and context.
    ///
    /// Every plugin the server installed takes part, including CORS, health
    /// and the endpoint guard.
    pub fn from_server(server: &Server) -> Self {
        Self {
            lifecycle: Arc::clone(server.lifecycle()),
            server_context: Arc::clone(server.server_context()),
            default_headers: HeaderMap::new(),
        }
    }

    /// Creates a client whose lifecycle only holds the default parsers.
    ///
    /// Any path is treated as the GraphQL endpoint.
    pub fn for_engine<E: Engine>(engine: E) -> Self {
        let engine: Arc<dyn Engine> = Arc::new(engine);
        let lifecycle = Lifecycle::builder(engine)
            .plugins(default_parser_plugins(
                Some(MultipartLimits::default()),
                DEFAULT_MAX_BODY_SIZE,
            ))
            .build();
        Self::new(lifecycle)
    }

    /// Replaces the server context forwarded to each request.
    pub fn with_server_context(mut self, server_context: ServerContext) -> Self {
        self.server_context = Arc::new(server_context);
        self
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub(crate) const fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Returns the lifecycle requests go through.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts an OPTIONS request.
    pub fn options(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        TestRequestBuilder::new(self, method, uri)
    }

    /// Runs a prepared request and returns the raw response.
    pub async fn handle(&self, request: Request) -> Response {
        self.lifecycle.handle(request, &self.server_context).await
    }

    pub(crate) async fn send_request(&self, request: Request) -> Result<TestResponse, TestError> {
        TestResponse::from_response(self.handle(request).await).await
    }
}
