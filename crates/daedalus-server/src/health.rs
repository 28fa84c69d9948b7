//! Liveness and readiness endpoints.
//!
//! [`HealthPlugin`] answers two paths before any GraphQL processing:
//!
//! | Path | Response |
//! |------|----------|
//! | `/health` | `200 {"message":"alive"}` with the `x-daedalus-server-id` header |
//! | `/readiness` | `200 {"message":"ready"}` once the server reaches itself |
//!
//! Readiness is a self-probe: the plugin issues `GET /health` against the
//! address the server is listening on and checks that the answer came from
//! this very instance. Until a listener is bound (in-memory use), the probe
//! falls back to the scheme and authority the readiness request arrived on. Any mismatch fails the request with
//! [`DaedalusError::Readiness`], which the lifecycle renders as a 500.

use crate::fetch::{Fetch, FetchResponse};
use crate::identity::{ServerIdentity, SERVER_ID_HEADER};
use daedalus_core::{BoxFuture, DaedalusError};
use daedalus_middleware::response::{self, APPLICATION_JSON};
use daedalus_middleware::{Capabilities, OnRequestDone, OnRequestPayload, Plugin};
use daedalus_telemetry::metrics::record_readiness;
use http::request::Parts;
use http::uri::{Authority, Scheme};
use http::{header, HeaderValue, StatusCode, Uri};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, OnceLock};

/// Default liveness path.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Default readiness path.
pub const DEFAULT_READINESS_PATH: &str = "/readiness";

#[derive(Deserialize)]
struct HealthBody {
    message: Option<String>,
}

/// The address readiness probes are sent to.
///
/// Shared between the plugin and the server; set once when the listener
/// is bound.
#[derive(Debug, Clone, Default)]
pub struct ProbeTarget(Arc<OnceLock<Authority>>);

impl ProbeTarget {
    /// Creates an unset target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the bound listener address. Later calls are ignored.
    ///
    /// Unspecified addresses are probed over loopback.
    pub fn set(&self, addr: SocketAddr) {
        let ip = match addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        let addr = SocketAddr::new(ip, addr.port());
        if let Ok(authority) = addr.to_string().parse::<Authority>() {
            let _ = self.0.set(authority);
        }
    }

    /// Returns the recorded authority, if any.
    pub fn get(&self) -> Option<&Authority> {
        self.0.get()
    }
}

/// Serves the health and readiness endpoints.
pub struct HealthPlugin {
    identity: ServerIdentity,
    fetch: Arc<dyn Fetch>,
    health_path: String,
    readiness_path: String,
    target: ProbeTarget,
}

impl HealthPlugin {
    /// Creates the plugin with the default paths.
    pub fn new(identity: ServerIdentity, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            identity,
            fetch,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            readiness_path: DEFAULT_READINESS_PATH.to_string(),
            target: ProbeTarget::new(),
        }
    }

    /// Probes the address recorded in `target` once it is set.
    #[must_use]
    pub fn with_probe_target(mut self, target: ProbeTarget) -> Self {
        self.target = target;
        self
    }

    /// Overrides the paths.
    #[must_use]
    pub fn with_paths(
        mut self,
        health_path: impl Into<String>,
        readiness_path: impl Into<String>,
    ) -> Self {
        self.health_path = health_path.into();
        self.readiness_path = readiness_path.into();
        self
    }

    /// Returns this instance's identity.
    pub const fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    fn alive(&self) -> daedalus_core::Response {
        let mut response = response::json(
            StatusCode::OK,
            APPLICATION_JSON,
            &serde_json::json!({ "message": "alive" }),
        );
        if let Ok(id) = HeaderValue::from_str(self.identity.as_str()) {
            response.headers_mut().insert(SERVER_ID_HEADER, id);
        }
        response
    }

    async fn ready(&self, head: &Parts) -> Result<daedalus_core::Response, DaedalusError> {
        let uri = probe_uri(head, &self.target, &self.health_path)?;
        tracing::debug!(uri = %uri, "probing own health endpoint");

        let outcome = match self.fetch.get(uri).await {
            Ok(probe) => self.check(&probe),
            Err(err) => Err(DaedalusError::readiness(format!("probe failed: {err}"))),
        };
        record_readiness(outcome.is_ok());
        outcome?;

        Ok(response::json(
            StatusCode::OK,
            APPLICATION_JSON,
            &serde_json::json!({ "message": "ready" }),
        ))
    }

    fn check(&self, probe: &FetchResponse) -> Result<(), DaedalusError> {
        if probe.status != StatusCode::OK {
            return Err(DaedalusError::readiness(format!(
                "health endpoint answered {}",
                probe.status
            )));
        }

        let peer = probe
            .headers
            .get(SERVER_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        if peer != Some(self.identity.as_str()) {
            tracing::warn!(
                expected = %self.identity,
                received = ?peer,
                "readiness probe reached another instance"
            );
            return Err(DaedalusError::readiness("server identity mismatch"));
        }

        let body: HealthBody = serde_json::from_slice(&probe.body)
            .map_err(|e| DaedalusError::readiness(format!("invalid health body: {e}")))?;
        if body.message.as_deref() != Some("alive") {
            return Err(DaedalusError::readiness("health endpoint is not alive"));
        }
        Ok(())
    }
}

/// Builds the self-probe URI with path `health_path`.
///
/// A bound listener address always wins over anything the client sent.
/// Otherwise the authority comes from the request URI, falling back to the
/// `Host` header. The scheme defaults to `http`.
fn probe_uri(
    head: &Parts,
    target: &ProbeTarget,
    health_path: &str,
) -> Result<Uri, DaedalusError> {
    if let Some(authority) = target.get() {
        return Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(authority.clone())
            .path_and_query(health_path)
            .build()
            .map_err(|e| DaedalusError::readiness(format!("invalid probe URI: {e}")));
    }

    let authority = match head.uri.authority() {
        Some(authority) => authority.clone(),
        None => head
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|host| host.parse::<Authority>().ok())
            .ok_or_else(|| DaedalusError::readiness("cannot determine own address"))?,
    };
    let scheme = head.uri.scheme().cloned().unwrap_or(Scheme::HTTP);

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(health_path)
        .build()
        .map_err(|e| DaedalusError::readiness(format!("invalid probe URI: {e}")))
}

impl Plugin for HealthPlugin {
    fn name(&self) -> &'static str {
        "health"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ON_REQUEST
    }

    fn on_request<'a>(
        &'a self,
        mut payload: OnRequestPayload<'a>,
    ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
        Box::pin(async move {
            let path = payload.request().uri.path();
            if path.ends_with(self.health_path.as_str()) {
                let alive = self.alive();
                payload.end_response(alive);
            } else if path.ends_with(self.readiness_path.as_str()) {
                let ready = self.ready(payload.request()).await?;
                payload.end_response(ready);
            }
            Ok(None)
        })
    }
}
