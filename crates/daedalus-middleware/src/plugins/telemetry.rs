//! Request logging and metrics.
//!
//! [`TelemetryPlugin`] gives every request an id (UUID v7, or the incoming
//! `x-request-id` when trusted), opens a `graphql_request` span, and on
//! completion logs the status and duration and records the request
//! metrics. It also counts uploaded files once parameters are parsed.

use crate::plugin::{
    Capabilities, OnParamsHook, OnRequestDone, OnRequestParsePayload, OnRequestPayload, Plugin,
};
use daedalus_core::{BoxFuture, DaedalusError, Value};
use daedalus_telemetry::metrics::{record_request, record_uploads, InFlightGuard};
use http::HeaderValue;
use std::time::Instant;
use uuid::Uuid;

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Emits logs and metrics for every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryPlugin {
    trust_incoming: bool,
}

impl TelemetryPlugin {
    /// Creates a plugin that always generates fresh request ids.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            trust_incoming: false,
        }
    }

    /// Creates a plugin that reuses a valid incoming `x-request-id`.
    #[must_use]
    pub const fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    fn request_id(&self, payload: &OnRequestPayload<'_>) -> Uuid {
        if self.trust_incoming {
            let incoming = payload
                .request()
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| Uuid::parse_str(v).ok());
            if let Some(id) = incoming {
                return id;
            }
        }
        Uuid::now_v7()
    }
}

/// Counts upload leaves in a value tree.
fn count_uploads(value: &Value) -> u64 {
    match value {
        Value::Upload(_) => 1,
        Value::List(items) => items.iter().map(count_uploads).sum(),
        Value::Object(map) => map.values().map(count_uploads).sum(),
        _ => 0,
    }
}

impl Plugin for TelemetryPlugin {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn on_request<'a>(
        &'a self,
        payload: OnRequestPayload<'a>,
    ) -> BoxFuture<'a, Result<Option<OnRequestDone>, DaedalusError>> {
        Box::pin(async move {
            let request_id = self.request_id(&payload);
            let head = payload.request();
            let method = head.method.to_string();
            let span = tracing::info_span!(
                "graphql_request",
                request_id = %request_id,
                method = %method,
                path = %head.uri.path(),
            );
            span.in_scope(|| tracing::debug!("request started"));

            let started = Instant::now();
            let in_flight = InFlightGuard::new();

            let done: OnRequestDone = Box::new(move |response| {
                let _entered = span.enter();
                let elapsed = started.elapsed();
                let status = response.status().as_u16();
                record_request(&method, status, elapsed);
                drop(in_flight);

                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                tracing::info!(
                    status,
                    duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "request completed"
                );
            });
            Ok(Some(done))
        })
    }

    fn on_request_parse(&self, _payload: &mut OnRequestParsePayload<'_>) -> Option<OnParamsHook> {
        Some(Box::new(|payload| {
            let uploads = payload
                .params()
                .variables
                .as_ref()
                .map_or(0, |vars| vars.values().map(count_uploads).sum());
            if uploads > 0 {
                tracing::debug!(uploads, "request carries uploaded files");
                record_uploads(uploads);
            }
        }))
    }
}
