//! Observability for the Daedalus GraphQL server.
//!
//! - **Logging**: `tracing` events rendered as JSON or pretty text, filtered
//!   by an `EnvFilter` (`RUST_LOG` wins over the configured level).
//! - **Metrics**: Prometheus metrics recorded through the `metrics` facade.
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};
//!
//! init_logging(&LogConfig::default())?;
//! init_metrics(&MetricsConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
