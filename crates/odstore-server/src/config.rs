//! Configuration management for the odstore server.
//!
//! Configuration is layered:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values, which take
//! precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use odstore_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("odstore.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::handlers::batch::{
    BatchLimits, DEFAULT_MAX_REQUESTS, DEFAULT_MAX_TOTAL_TOP, DEFAULT_TIMEOUT,
};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "ODSTORE";

/// Upper bound on `batch.timeout_millis` (one day).
const MAX_BATCH_TIMEOUT_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsSettings,

    /// `$batch` limits
    #[serde(default)]
    pub batch: BatchSettings,
}

/// Server network settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds for non-batch routes
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum `$batch` request body size in bytes
    #[serde(default = "default_max_batch_body_bytes")]
    pub max_batch_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_batch_body_bytes: default_max_batch_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_batch_body_bytes() -> usize {
    16 * 1024 * 1024
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MetricsSettings {
    /// Enable metrics endpoint
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// `$batch` limits.
///
/// - `ODSTORE_BATCH__MAX_REQUESTS=500` - lower the sub-request limit
/// - `ODSTORE_BATCH__TIMEOUT_MILLIS=60000` - shorten the execution budget
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BatchSettings {
    /// Maximum sub-requests per batch, counting changeset members
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Maximum sum of `$top` over the GET sub-requests of a batch
    #[serde(default = "default_max_total_top")]
    pub max_total_top: u64,

    /// Execution budget of one batch in milliseconds
    #[serde(default = "default_timeout_millis")]
    pub timeout_millis: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            max_total_top: default_max_total_top(),
            timeout_millis: default_timeout_millis(),
        }
    }
}

impl BatchSettings {
    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_requests: self.max_requests,
            max_total_top: self.max_total_top,
            timeout: Duration::from_millis(self.timeout_millis),
        }
    }
}

fn default_max_requests() -> usize {
    DEFAULT_MAX_REQUESTS
}

fn default_max_total_top() -> u64 {
    DEFAULT_MAX_TOTAL_TOP
}

fn default_timeout_millis() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigLoadError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigLoadError::Invalid {
            message: message.into(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `ODSTORE_` and use `__` as
    /// separator, e.g. `ODSTORE_SERVER__PORT=9090` overrides `server.port`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.server.port == 0 {
            return Err(ConfigLoadError::invalid(
                "server.port must be greater than 0",
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigLoadError::invalid(
                "server.request_timeout_secs must be greater than 0",
            ));
        }
        if self.server.max_batch_body_bytes == 0 {
            return Err(ConfigLoadError::invalid(
                "server.max_batch_body_bytes must be greater than 0",
            ));
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::invalid(format!(
                "storage.backend must be one of: {:?}, got: {}",
                valid_backends, self.storage.backend
            )));
        }

        let path = &self.metrics.path;
        if !path.starts_with('/') || path.len() < 2 || path.contains(|c| c == ':' || c == '*') {
            return Err(ConfigLoadError::invalid(format!(
                "metrics.path must be a literal absolute path, got: {path}"
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }

        if self.batch.max_requests == 0 {
            return Err(ConfigLoadError::invalid(
                "batch.max_requests must be greater than 0",
            ));
        }
        if self.batch.max_total_top == 0 {
            return Err(ConfigLoadError::invalid(
                "batch.max_total_top must be greater than 0",
            ));
        }
        if self.batch.timeout_millis == 0 || self.batch.timeout_millis > MAX_BATCH_TIMEOUT_MILLIS {
            return Err(ConfigLoadError::invalid(format!(
                "batch.timeout_millis must be between 1 and {MAX_BATCH_TIMEOUT_MILLIS}, got: {}",
                self.batch.timeout_millis
            )));
        }

        Ok(())
    }
}

/// `ODSTORE_SERVER__PORT` -> `server.port`
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Test: Can load config from YAML file
    #[test]
    #[serial]
    fn test_can_load_config_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9090
  request_timeout_secs: 60
  max_batch_body_bytes: 1048576

storage:
  backend: memory

logging:
  level: debug
  json: true

metrics:
  enabled: true
  path: /custom-metrics

batch:
  max_requests: 200
  max_total_top: 5000
  timeout_millis: 10000
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.request_timeout_secs, 60);
        assert_eq!(config.server.max_batch_body_bytes, 1_048_576);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.metrics.path, "/custom-metrics");
        assert_eq!(
            config.batch.limits(),
            BatchLimits {
                max_requests: 200,
                max_total_top: 5000,
                timeout: Duration::from_secs(10),
            }
        );
    }

    /// Test: Can override config with env vars
    #[test]
    #[serial]
    fn test_can_override_config_with_env_vars() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 8080
"#
        )
        .unwrap();

        std::env::set_var("ODSTORE_SERVER__PORT", "9999");
        std::env::set_var("ODSTORE_BATCH__MAX_REQUESTS", "10");

        let config = ServerConfig::load(file.path());

        std::env::remove_var("ODSTORE_SERVER__PORT");
        std::env::remove_var("ODSTORE_BATCH__MAX_REQUESTS");

        let config = config.unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.batch.max_requests, 10);
    }

    /// Test: Config validation catches errors
    #[test]
    fn test_config_validation_catches_errors() {
        let cases: [(fn(&mut ServerConfig), &str); 10] = [
            (|c: &mut ServerConfig| c.server.port = 0, "server.port"),
            (
                |c: &mut ServerConfig| c.server.request_timeout_secs = 0,
                "request_timeout_secs",
            ),
            (
                |c: &mut ServerConfig| c.metrics.path = "/stores/:store_id".to_string(),
                "metrics.path",
            ),
            (
                |c: &mut ServerConfig| c.server.max_batch_body_bytes = 0,
                "max_batch_body_bytes",
            ),
            (
                |c: &mut ServerConfig| c.storage.backend = "postgres".to_string(),
                "storage.backend",
            ),
            (
                |c: &mut ServerConfig| c.logging.level = "verbose".to_string(),
                "logging.level",
            ),
            (|c: &mut ServerConfig| c.batch.max_requests = 0, "batch.max_requests"),
            (|c: &mut ServerConfig| c.batch.max_total_top = 0, "batch.max_total_top"),
            (|c: &mut ServerConfig| c.batch.timeout_millis = 0, "batch.timeout_millis"),
            (
                |c: &mut ServerConfig| c.batch.timeout_millis = u64::MAX,
                "batch.timeout_millis",
            ),
        ];

        for (mutate, field) in cases {
            let mut config = ServerConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{err} should mention {field}");
        }
    }

    /// Test: Invalid config returns clear error
    #[test]
    fn test_invalid_config_returns_clear_error() {
        let result = ServerConfig::load("/nonexistent/path/odstore.yaml");
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
        assert!(err.to_string().contains("not found"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: syntax: [").unwrap();

        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    /// Test: Default config is valid
    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_batch_body_bytes, 16 * 1024 * 1024);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.logging.level, "info");
        assert!(config.metrics.enabled);
        assert_eq!(config.batch.max_requests, 1000);
        assert_eq!(config.batch.max_total_top, 10_000);
        assert_eq!(config.batch.timeout_millis, 270_000);
        assert_eq!(config.batch.limits(), BatchLimits::default());
    }

    /// Test: from_env loads defaults with env overrides
    #[test]
    #[serial]
    fn test_from_env_loads_defaults_with_env_overrides() {
        std::env::set_var("ODSTORE_SERVER__HOST", "192.168.1.1");

        let config = ServerConfig::from_env();

        std::env::remove_var("ODSTORE_SERVER__HOST");

        let config = config.unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 8080);
    }

    /// Test: invalid env override is rejected by validation
    #[test]
    #[serial]
    fn test_env_override_is_validated() {
        std::env::set_var("ODSTORE_BATCH__TIMEOUT_MILLIS", "0");

        let result = ServerConfig::from_env();

        std::env::remove_var("ODSTORE_BATCH__TIMEOUT_MILLIS");

        assert!(matches!(result, Err(ConfigLoadError::Invalid { .. })));
    }
}
