//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `CAMINO_*` environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::map::Theme;
use crate::metadata::{FetcherConfig, USER_AGENT};
use crate::points::{JourneyId, DEFAULT_JOURNEY};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub journey: JourneyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which point store backs the API server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Point store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("camino").join("points.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./camino_data/points.db".to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Concurrent WebSocket connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// An account allowed to add and edit points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAccount {
    pub email: String,
    /// Hex SHA-256 of the password
    pub password_sha256: String,
}

/// Admin authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub admins: Vec<AdminAccount>,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: u64,
}

fn default_session_ttl() -> u64 {
    24
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            session_ttl_hours: default_session_ttl(),
        }
    }
}

/// Link preview fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_metadata_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_metadata_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl MetadataConfig {
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Journey shown by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyConfig {
    #[serde(default = "default_journey_id")]
    pub id: String,

    /// How often HTTP clients poll for changes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub theme: Theme,
}

fn default_journey_id() -> String {
    DEFAULT_JOURNEY.to_string()
}

fn default_poll_interval() -> u64 {
    2000
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            id: default_journey_id(),
            poll_interval_ms: default_poll_interval(),
            theme: Theme::default(),
        }
    }
}

impl JourneyConfig {
    pub fn journey_id(&self) -> JourneyId {
        JourneyId::new(self.id.clone())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::search_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Config file locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("camino").join("config.toml")),
            Some(PathBuf::from("/etc/camino/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Store overrides
        if let Some(backend) = var("CAMINO_STORE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.store.backend = b,
                Err(e) => tracing::warn!("Ignoring CAMINO_STORE_BACKEND: {}", e),
            }
        }
        if let Some(path) = var("CAMINO_STORE_PATH") {
            self.store.path = path;
        }

        // API overrides
        if let Some(host) = var("CAMINO_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("CAMINO_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // An admin from the environment joins the configured ones
        if let (Some(email), Some(password_sha256)) = (
            var("CAMINO_ADMIN_EMAIL"),
            var("CAMINO_ADMIN_PASSWORD_SHA256"),
        ) {
            self.auth.admins.push(AdminAccount {
                email,
                password_sha256,
            });
        }

        if let Some(journey) = var("CAMINO_JOURNEY") {
            self.journey.id = journey;
        }

        // Logging overrides
        if let Some(level) = var("CAMINO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("CAMINO_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Camino Configuration
#
# Environment variables override these settings:
# - CAMINO_STORE_BACKEND
# - CAMINO_STORE_PATH
# - CAMINO_API_HOST
# - CAMINO_API_PORT
# - CAMINO_ADMIN_EMAIL and CAMINO_ADMIN_PASSWORD_SHA256
# - CAMINO_JOURNEY
# - CAMINO_LOG_LEVEL
# - CAMINO_LOG_FORMAT

[store]
# Point store: "sqlite" (durable) or "memory"
backend = "sqlite"

# SQLite database file
path = "~/.local/share/camino/points.db"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins (empty allows any origin)
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 30

# Maximum concurrent WebSocket connections
max_connections = 1000

[auth]
# Session lifetime (hours)
session_ttl_hours = 24

# Admin accounts. Generate a digest with: camino-cli config hash-password
# [[auth.admins]]
# email = "you@example.com"
# password_sha256 = "..."

[metadata]
# Link preview fetch timeout in seconds
timeout_secs = 10

# User agent sent when fetching pages
user_agent = "Mozilla/5.0 (compatible; LinkPreviewBot/1.0)"

[journey]
# Journey shown by clients
id = "camino"

# How often HTTP clients poll for changes (ms)
poll_interval_ms = 2000

# Map theme: light or dark
theme = "light"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.api.port, 8082);
        assert_eq!(config.auth.session_ttl_hours, 24);
        assert!(config.auth.admins.is_empty());
        assert_eq!(config.journey.id, "camino");
        assert_eq!(config.journey.theme, Theme::Light);
        assert_eq!(config.metadata.user_agent, USER_AGENT);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [store]
            backend = "memory"

            [[auth.admins]]
            email = "pilgrim@example.com"
            password_sha256 = "abc"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.auth.admins.len(), 1);
        assert_eq!(config.api.addr(), "0.0.0.0:8082");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[api\nport = ").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CAMINO_STORE_BACKEND", "memory"),
            ("CAMINO_API_PORT", "9000"),
            ("CAMINO_ADMIN_EMAIL", "pilgrim@example.com"),
            ("CAMINO_ADMIN_PASSWORD_SHA256", "abc"),
            ("CAMINO_JOURNEY", "via-francigena"),
            ("CAMINO_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.auth.admins[0].email, "pilgrim@example.com");
        assert_eq!(config.journey.journey_id(), JourneyId::new("via-francigena"));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_bad_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "CAMINO_API_PORT").then(|| "lots".to_string()));
        assert_eq!(config.api.port, 8082);
    }
}
