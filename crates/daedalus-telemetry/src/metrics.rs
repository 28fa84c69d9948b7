//! Prometheus metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `daedalus_requests_total` | Counter | `method`, `status` |
//! | `daedalus_request_duration_seconds` | Histogram | `method` |
//! | `daedalus_requests_in_flight` | Gauge | - |
//! | `daedalus_upload_files_total` | Counter | - |
//! | `daedalus_readiness_checks_total` | Counter | `outcome` |
//!
//! Recording before [`init_metrics`] (or with metrics disabled) is a no-op.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Total requests handled.
pub const REQUESTS_TOTAL: &str = "daedalus_requests_total";
/// Request latency.
pub const REQUEST_DURATION_SECONDS: &str = "daedalus_request_duration_seconds";
/// Requests currently being handled.
pub const REQUESTS_IN_FLIGHT: &str = "daedalus_requests_in_flight";
/// Uploaded files bound into variables.
pub const UPLOAD_FILES_TOTAL: &str = "daedalus_upload_files_total";
/// Readiness probes by outcome.
pub const READINESS_CHECKS_TOTAL: &str = "daedalus_readiness_checks_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// Calling it again after a successful install is a no-op.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] if the recorder cannot be built
/// or another recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    describe_metrics();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of GraphQL HTTP requests");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "GraphQL HTTP request duration in seconds"
    );
    describe_gauge!(
        REQUESTS_IN_FLIGHT,
        "Number of GraphQL HTTP requests currently being handled"
    );
    describe_counter!(UPLOAD_FILES_TOTAL, "Total number of uploaded files");
    describe_counter!(READINESS_CHECKS_TOTAL, "Readiness self-probes by outcome");
}

/// Records a completed request.
pub fn record_request(method: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

/// Records files bound from a multipart request.
pub fn record_uploads(count: u64) {
    if count > 0 {
        counter!(UPLOAD_FILES_TOTAL).increment(count);
    }
}

/// Records the outcome of a readiness probe.
pub fn record_readiness(ready: bool) {
    let outcome = if ready { "ready" } else { "not_ready" };
    counter!(READINESS_CHECKS_TOTAL, "outcome" => outcome).increment(1);
}

/// Keeps `daedalus_requests_in_flight` raised while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}
