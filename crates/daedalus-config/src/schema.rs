//! Configuration sections.
//!
//! Every section rejects unknown fields and fills missing ones from its
//! `default_*` functions, so a file only needs the values it changes.

use daedalus_extract::multipart::{
    DEFAULT_MAX_FIELD_SIZE, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_HEADER_SIZE,
};
use daedalus_extract::{MultipartLimits, DEFAULT_MAX_BODY_SIZE};
use daedalus_middleware::plugins::{AllowedOrigins, CorsPolicy};
use daedalus_server::health::{DEFAULT_HEALTH_PATH, DEFAULT_READINESS_PATH};
use daedalus_server::{
    HealthPaths, ServerConfig, DEFAULT_ENDPOINT, DEFAULT_HTTP_ADDR, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use daedalus_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Address to bind, `host:port`.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Seconds to wait for in-flight connections on shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent connections. Unbounded when absent.
    #[serde(default)]
    pub max_connections: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            max_connections: None,
        }
    }
}

impl ServerSection {
    /// Converts into the server's runtime configuration.
    #[must_use]
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(self.shutdown_timeout_secs))
            .max_connections(self.max_connections)
            .build()
    }
}

fn default_http_addr() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}

const fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

/// GraphQL endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GraphQLSection {
    /// Path the endpoint is served at.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Replace unexpected error messages with a generic one.
    #[serde(default)]
    pub mask_errors: bool,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Multipart upload settings.
    #[serde(default)]
    pub multipart: MultipartSection,
}

impl Default for GraphQLSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            mask_errors: false,
            max_body_size: default_max_body_size(),
            multipart: MultipartSection::default(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

const fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

/// Multipart upload limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MultipartSection {
    /// Accept `multipart/form-data` requests.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum bytes per file.
    #[serde(default = "default_file_size")]
    pub file_size: usize,

    /// Maximum number of files.
    #[serde(default = "default_files")]
    pub files: usize,

    /// Maximum bytes per non-file field.
    #[serde(default = "default_field_size")]
    pub field_size: usize,

    /// Maximum bytes of part headers.
    #[serde(default = "default_header_size")]
    pub header_size: usize,
}

impl Default for MultipartSection {
    fn default() -> Self {
        Self {
            enabled: true,
            file_size: default_file_size(),
            files: default_files(),
            field_size: default_field_size(),
            header_size: default_header_size(),
        }
    }
}

impl MultipartSection {
    /// Converts into decoder limits, or `None` when uploads are disabled.
    #[must_use]
    pub fn to_limits(&self, max_body_size: usize) -> Option<MultipartLimits> {
        self.enabled.then(|| {
            MultipartLimits::new()
                .file_size(self.file_size)
                .files(self.files)
                .field_size(self.field_size)
                .header_size(self.header_size)
                .body_size(max_body_size)
        })
    }
}

const fn default_file_size() -> usize {
    DEFAULT_MAX_FILE_SIZE
}

const fn default_files() -> usize {
    DEFAULT_MAX_FILES
}

const fn default_field_size() -> usize {
    DEFAULT_MAX_FIELD_SIZE
}

const fn default_header_size() -> usize {
    DEFAULT_MAX_HEADER_SIZE
}

/// CORS settings.
///
/// `origins = ["*"]` allows any origin. Leaving a list out echoes what the
/// preflight asked for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// Install the CORS plugin.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allowed origins.
    #[serde(default)]
    pub origins: Option<Vec<String>>,

    /// Allowed methods.
    #[serde(default)]
    pub methods: Option<Vec<String>>,

    /// Allowed request headers.
    #[serde(default)]
    pub allowed_headers: Option<Vec<String>>,

    /// Response headers exposed to scripts.
    #[serde(default)]
    pub exposed_headers: Option<Vec<String>>,

    /// Allow credentials.
    #[serde(default)]
    pub credentials: bool,

    /// Preflight cache duration.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: None,
            methods: None,
            allowed_headers: None,
            exposed_headers: None,
            credentials: false,
            max_age_secs: None,
        }
    }
}

impl CorsSection {
    /// Converts into a policy, or `None` when CORS is disabled.
    #[must_use]
    pub fn to_policy(&self) -> Option<CorsPolicy> {
        if !self.enabled {
            return None;
        }
        let origin = self.origins.as_ref().map(|origins| {
            if origins.iter().any(|o| o == "*") {
                AllowedOrigins::Any
            } else {
                AllowedOrigins::List(origins.clone())
            }
        });
        Some(CorsPolicy {
            origin,
            methods: self
                .methods
                .as_ref()
                .map(|methods| methods.iter().map(|m| m.to_uppercase()).collect()),
            allowed_headers: self.allowed_headers.clone(),
            exposed_headers: self.exposed_headers.clone(),
            credentials: self.credentials,
            max_age: self.max_age_secs,
        })
    }
}

/// Health and readiness settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HealthSection {
    /// Install the health plugin.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Liveness path.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Readiness path.
    #[serde(default = "default_readiness_path")]
    pub readiness_path: String,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            enabled: true,
            health_path: default_health_path(),
            readiness_path: default_readiness_path(),
        }
    }
}

impl HealthSection {
    /// Converts into plugin paths, or `None` when the plugin is disabled.
    #[must_use]
    pub fn to_paths(&self) -> Option<HealthPaths> {
        self.enabled.then(|| HealthPaths {
            health: self.health_path.clone(),
            readiness: self.readiness_path.clone(),
        })
    }
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_readiness_path() -> String {
    DEFAULT_READINESS_PATH.to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingSection {
    /// Converts into the logging configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig::default()
            .with_level(self.level.clone())
            .with_format(self.format)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_fill_missing_fields() {
        let section: GraphQLSection = toml::from_str(r#"mask_errors = true"#).unwrap();
        assert!(section.mask_errors);
        assert_eq!(section.endpoint, "/graphql");
        assert!(section.multipart.enabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<CorsSection, _> = toml::from_str(r#"origin = "a.test""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_cors_star_means_any() {
        let section = CorsSection {
            origins: Some(vec!["*".to_string()]),
            ..CorsSection::default()
        };
        assert_eq!(section.to_policy().unwrap().origin, Some(AllowedOrigins::Any));
    }

    #[test]
    fn test_cors_list_and_methods() {
        let section = CorsSection {
            origins: Some(vec!["http://a.test".to_string()]),
            methods: Some(vec!["post".to_string()]),
            credentials: true,
            max_age_secs: Some(600),
            ..CorsSection::default()
        };
        let policy = section.to_policy().unwrap();
        assert_eq!(
            policy.origin,
            Some(AllowedOrigins::List(vec!["http://a.test".to_string()]))
        );
        assert_eq!(policy.methods, Some(vec!["POST".to_string()]));
        assert!(policy.credentials);
        assert_eq!(policy.max_age, Some(600));
    }

    #[test]
    fn test_cors_disabled() {
        let section = CorsSection {
            enabled: false,
            ..CorsSection::default()
        };
        assert!(section.to_policy().is_none());
    }

    #[test]
    fn test_multipart_limits() {
        let section = MultipartSection {
            file_size: 5,
            files: 2,
            ..MultipartSection::default()
        };
        let limits = section.to_limits(1024).unwrap();
        assert_eq!(limits.file_size, 5);
        assert_eq!(limits.files, 2);
        assert_eq!(limits.body_size, 1024);

        let disabled = MultipartSection {
            enabled: false,
            ..MultipartSection::default()
        };
        assert!(disabled.to_limits(1024).is_none());
    }

    #[test]
    fn test_server_section_conversion() {
        let section = ServerSection {
            http_addr: "127.0.0.1:9000".to_string(),
            shutdown_timeout_secs: 5,
            max_connections: Some(10),
        };
        let config = section.to_server_config();
        assert_eq!(config.http_addr(), "127.0.0.1:9000");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_connections(), Some(10));
    }

    #[test]
    fn test_health_paths() {
        let paths = HealthSection::default().to_paths().unwrap();
        assert_eq!(paths, HealthPaths::default());
    }

    #[test]
    fn test_logging_conversion() {
        let section = LoggingSection {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        };
        let config = section.to_log_config();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
