//! Cross-origin resource sharing.
//!
//! [`cors_headers`] computes the CORS response headers for a request from a
//! [`CorsPolicy`]. It is a pure function; [`CorsPlugin`] applies it:
//!
//! - `OPTIONS` requests are answered with `204 No Content` and the computed
//!   headers, before any parsing happens.
//! - Every other request gets the same headers stamped on its final
//!   response.
//! - Requests without an `Origin` header get the same treatment.
//!
//! ## Example
//!
//! ```
//! use daedalus_middleware::plugins::cors::{CorsPlugin, CorsPolicy};
//!
//! let cors = CorsPlugin::new(
//!     CorsPolicy::builder()
//!         .allow_origins(["https://a.test", "https://b.test"])
//!         .allow_credentials(true)
//!         .build(),
//! );
//! # let _ = cors;
//! ```

use crate::plugin::{Capabilities, OnRequestDone, OnRequestPayload, Plugin};
use crate::response;
use daedalus_core::{BoxFuture, DaedalusError};
use http::request::Parts;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
}

/// The origins a policy allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// Only the listed origins.
    List(Vec<String>),
}

/// A CORS policy.
///
/// Absent lists fall back to echoing what the preflight asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Allowed origins. `None` behaves like [`AllowedOrigins::Any`].
    pub origin: Option<AllowedOrigins>,
    /// Allowed methods.
    pub methods: Option<Vec<String>>,
    /// Allowed request headers.
    pub allowed_headers: Option<Vec<String>>,
    /// Response headers exposed to scripts.
    pub exposed_headers: Option<Vec<String>>,
    /// Whether credentials are allowed.
    pub credentials: bool,
    /// Preflight cache duration in seconds.
    pub max_age: Option<u64>,
}

impl CorsPolicy {
    /// Creates a builder for a policy.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::default()
    }
}

/// Builder for [`CorsPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    policy: CorsPolicy,
}

impl CorsBuilder {
    /// Allows any origin.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.policy.origin = Some(AllowedOrigins::Any);
        self
    }

    /// Adds an allowed origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        match &mut self.policy.origin {
            Some(AllowedOrigins::Any) => {}
            Some(AllowedOrigins::List(origins)) => origins.push(origin.into()),
            None => self.policy.origin = Some(AllowedOrigins::List(vec![origin.into()])),
        }
        self
    }

    /// Replaces the allowed origins.
    #[must_use]
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.origin = Some(AllowedOrigins::List(
            origins.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Sets the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.policy.methods = Some(methods.into_iter().map(|m| m.to_string()).collect());
        self
    }

    /// Sets the allowed request headers.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.allowed_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the headers exposed to scripts.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.exposed_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Sets whether credentials are allowed.
    #[must_use]
    pub const fn allow_credentials(mut self, allow: bool) -> Self {
        self.policy.credentials = allow;
        self
    }

    /// Sets the preflight cache duration.
    #[must_use]
    pub const fn max_age(mut self, seconds: u64) -> Self {
        self.policy.max_age = Some(seconds);
        self
    }

    /// Builds the policy.
    #[must_use]
    pub fn build(self) -> CorsPolicy {
        self.policy
    }
}

fn join(values: &[String]) -> Option<HeaderValue> {
    HeaderValue::from_str(&values.join(", ")).ok()
}

/// Computes the CORS response headers for a request.
pub fn cors_headers(head: &Parts, policy: &CorsPolicy) -> HeaderMap {
    let request = &head.headers;
    let origin = request.get(header::ORIGIN);
    let mut out = HeaderMap::new();

    let mut allow_origin = HeaderValue::from_static("*");
    if let Some(origin) = origin {
        if request.contains_key(header::COOKIE) {
            allow_origin = origin.clone();
        }
    }
    if let (Some(origin), Some(AllowedOrigins::List(allowed))) = (origin, &policy.origin) {
        allow_origin = if allowed.iter().any(|o| o.as_bytes() == origin.as_bytes()) {
            origin.clone()
        } else {
            HeaderValue::from_static("null")
        };
    }

    let narrowed = allow_origin != "*" && allow_origin != "null";
    if allow_origin != "*" {
        out.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
    out.insert(headers::ALLOW_ORIGIN, allow_origin);

    let methods = match &policy.methods {
        Some(methods) => join(methods),
        None => request.get(headers::REQUEST_METHOD).cloned(),
    };
    if let Some(methods) = methods {
        out.insert(headers::ALLOW_METHODS, methods);
    }

    match &policy.allowed_headers {
        Some(allowed) => {
            if let Some(value) = join(allowed) {
                out.insert(headers::ALLOW_HEADERS, value);
            }
        }
        None => {
            if let Some(requested) = request.get(headers::REQUEST_HEADERS) {
                out.insert(headers::ALLOW_HEADERS, requested.clone());
                append_vary(&mut out, "Access-Control-Request-Headers");
            }
        }
    }

    if policy.credentials || narrowed {
        out.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }

    if let Some(value) = policy.exposed_headers.as_deref().and_then(join) {
        out.insert(headers::EXPOSE_HEADERS, value);
    }
    if let Some(max_age) = policy.max_age {
        out.insert(headers::MAX_AGE, HeaderValue::from(max_age));
    }

    out
}

/// Appends `value` to the `Vary` header, comma-joined.
fn append_vary(headers: &mut HeaderMap, value: &str) {
    let joined = match headers.get(header::VARY).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {value}"),
        _ => value.to_string(),
    };
    if let Ok(joined) = HeaderValue::from_str(&joined) {
        headers.insert(header::VARY, joined);
    }
}

/// Copies computed CORS headers onto a response, appending to `Vary`.
fn stamp(target: &mut HeaderMap, computed: HeaderMap) {
    for (name, value) in &computed {
        if name == header::VARY {
            if let Ok(value) = value.to_str() {
                append_vary(target, value);
            }
        } else {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Applies a [`CorsPolicy`] to every request.
///
/// `OPTIONS` requests end with 204; every response gets the computed headers.
#[derive(Debug, Clone, Default)]
pub struct CorsPlugin {
    policy: CorsPolicy,
}

impl CorsPlugin {
    /// Creates the plugin.
    #[must_use]
    pub const fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    pub const fn policy(&self) -> &CorsPolicy {
        &self.policy
    }
}

impl Plugin for CorsPlugin {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ON_REQUEST
    }

    fn on_request<'a>(
        &'a self,
        mut payload: OnRequestPayload<'a>,
    ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
        Box::pin(async move {
            let head = payload.request();
            let computed = cors_headers(head, &self.policy);
            if head.method == Method::OPTIONS {
                payload.end_response(response::empty(StatusCode::NO_CONTENT));
            }

            let done: OnRequestDone =
                Box::new(move |response| stamp(response.headers_mut(), computed));
            Ok(Some(done))
        })
    }
}
