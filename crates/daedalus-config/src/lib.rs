//! # Daedalus Config
//!
//! Typed, layered configuration for the Daedalus GraphQL server.
//!
//! - [`DaedalusConfig`] holds every section and validates it
//! - [`ConfigLoader`] layers defaults, a TOML/JSON file and
//!   `DAEDALUS__SECTION__KEY` environment variables
//! - Each section converts into the runtime type it configures
//!
//! ## Example
//!
//! ```no_run
//! use daedalus_config::ConfigLoader;
//!
//! # fn main() -> Result<(), daedalus_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("daedalus.toml")?
//!     .with_env_prefix("DAEDALUS")
//!     .load()?;
//!
//! let server = config.server.to_server_config();
//! let cors = config.cors.to_policy();
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
pub mod schema;

pub use config::DaedalusConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    CorsSection, GraphQLSection, HealthSection, LoggingSection, MultipartSection, ServerSection,
};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "DAEDALUS";
