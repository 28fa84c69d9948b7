//! The top-level configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::schema::{
    CorsSection, GraphQLSection, HealthSection, LoggingSection, ServerSection,
};
use crate::ConfigError;
use daedalus_server::{Server, ServerBuilder};
use daedalus_telemetry::LogFormat;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Complete Daedalus configuration.
///
/// # Example
///
/// ```toml
/// [server]
/// http_addr = "0.0.0.0:4000"
///
/// [graphql]
/// endpoint = "/graphql"
/// mask_errors = true
///
/// [graphql.multipart]
/// file_size = 1048576
///
/// [cors]
/// origins = ["https://app.example.com"]
/// credentials = true
///
/// [logging]
/// level = "info"
/// format = "json"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct DaedalusConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// GraphQL endpoint settings.
    #[serde(default)]
    pub graphql: GraphQLSection,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsSection,

    /// Health and readiness settings.
    #[serde(default)]
    pub health: HealthSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DaedalusConfig {
    /// Checks values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if !self.graphql.endpoint.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "graphql.endpoint",
                "must start with '/'",
            ));
        }

        let health = &self.health;
        if health.enabled {
            for (field, path) in [
                ("health.health_path", &health.health_path),
                ("health.readiness_path", &health.readiness_path),
            ] {
                if !path.starts_with('/') {
                    return Err(ConfigError::invalid_value(field, "must start with '/'"));
                }
            }
        }

        if self.server.max_connections == Some(0) {
            return Err(ConfigError::invalid_value(
                "server.max_connections",
                "must be greater than zero",
            ));
        }

        let multipart = &self.graphql.multipart;
        for (field, value) in [
            ("graphql.max_body_size", self.graphql.max_body_size),
            ("graphql.multipart.file_size", multipart.file_size),
            ("graphql.multipart.files", multipart.files),
            ("graphql.multipart.field_size", multipart.field_size),
            ("graphql.multipart.header_size", multipart.header_size),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }

        Ok(())
    }

    /// Returns a server builder carrying every configured setting.
    ///
    /// The engine and any extra plugins are still up to the caller.
    pub fn server_builder(&self) -> ServerBuilder {
        Server::builder()
            .config(self.server.to_server_config())
            .endpoint(self.graphql.endpoint.clone())
            .mask_errors(self.graphql.mask_errors)
            .max_body_size(self.graphql.max_body_size)
            .multipart(self.graphql.multipart.to_limits(self.graphql.max_body_size))
            .cors(self.cors.to_policy())
            .health(self.health.to_paths())
    }

    /// Returns a configuration suited to local development.
    ///
    /// Debug-level pretty logs and unmasked errors.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.graphql.mask_errors = false;
        config
    }

    /// Returns a configuration suited to production.
    ///
    /// JSON logs and masked errors.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.graphql.mask_errors = true;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        DaedalusConfig::default().validate().unwrap();
    }

    #[test]
    fn test_presets() {
        let dev = DaedalusConfig::development();
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert!(!dev.graphql.mask_errors);

        let prod = DaedalusConfig::production();
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(prod.graphql.mask_errors);
    }

    #[test]
    fn test_rejects_bad_address() {
        let mut config = DaedalusConfig::default();
        config.server.http_addr = "not-an-address".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_rejects_relative_endpoint() {
        let mut config = DaedalusConfig::default();
        config.graphql.endpoint = "graphql".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = DaedalusConfig::default();
        config.graphql.multipart.files = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("graphql.multipart.files"));

        let mut config = DaedalusConfig::default();
        config.server.max_connections = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = DaedalusConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "WARN".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_server_builder_requires_engine() {
        let result = DaedalusConfig::default().server_builder().build();
        assert!(matches!(result, Err(daedalus_server::ServerError::MissingEngine)));
    }

    #[test]
    fn test_relative_health_path_ignored_when_disabled() {
        let mut config = DaedalusConfig::default();
        config.health.health_path = "health".to_string();
        assert!(config.validate().is_err());

        config.health.enabled = false;
        config.validate().unwrap();
    }
}
