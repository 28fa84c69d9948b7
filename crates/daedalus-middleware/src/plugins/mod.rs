//! Built-in plugins.
//!
//! | Plugin | Hooks | Purpose |
//! |--------|-------|---------|
//! | [`TelemetryPlugin`] | both | request id, span, metrics |
//! | [`CorsPlugin`] | `on_request` | preflight answers and CORS headers |
//! | [`EndpointPlugin`] | `on_request` | 404 outside the GraphQL endpoint |
//! | [`ParserPlugin`] | `on_request_parse` | installs a parse strategy |

pub mod cors;
mod endpoint;
mod parsers;
mod telemetry;

pub use cors::{cors_headers, AllowedOrigins, CorsBuilder, CorsPlugin, CorsPolicy};
pub use endpoint::EndpointPlugin;
pub use parsers::{default_parser_plugins, ParserPlugin};
pub use telemetry::{TelemetryPlugin, REQUEST_ID_HEADER};
