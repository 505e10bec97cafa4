//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::hub::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared-secret authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_secret")]
    pub secret: String,
}

fn default_secret() -> String {
    "dev-secret-change-me".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
        }
    }
}

/// Relay hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    #[serde(default = "default_evict_empty")]
    pub evict_empty_devices: bool,
}

fn default_send_timeout() -> u64 {
    5000
}

fn default_evict_empty() -> bool {
    true
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout(),
            evict_empty_devices: default_evict_empty(),
        }
    }
}

impl From<&HubSettings> for HubConfig {
    fn from(settings: &HubSettings) -> Self {
        Self {
            send_timeout_ms: settings.send_timeout_ms,
            evict_empty_devices: settings.evict_empty_devices,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
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
        let config_paths = [
            dirs::config_dir().map(|p| p.join("cribside").join("config.toml")),
            Some(PathBuf::from("/etc/cribside/config.toml")),
            Some(PathBuf::from("./cribside.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
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

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CRIBSIDE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CRIBSIDE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(origins) = std::env::var("CRIBSIDE_CORS_ORIGINS") {
            self.server.cors_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }

        // APP_SECRET is honored for parity with older deployments.
        if let Ok(secret) = std::env::var("CRIBSIDE_SECRET") {
            self.auth.secret = secret;
        } else if let Ok(secret) = std::env::var("APP_SECRET") {
            self.auth.secret = secret;
        }

        if let Ok(timeout) = std::env::var("CRIBSIDE_SEND_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.hub.send_timeout_ms = t;
            }
        }

        if let Ok(level) = std::env::var("CRIBSIDE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CRIBSIDE_LOG_FORMAT") {
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
    r#"# Cribside Configuration
#
# Environment variables override these settings:
# - CRIBSIDE_HOST
# - CRIBSIDE_PORT
# - CRIBSIDE_CORS_ORIGINS (comma separated)
# - CRIBSIDE_SECRET (or APP_SECRET)
# - CRIBSIDE_SEND_TIMEOUT_MS
# - CRIBSIDE_LOG_LEVEL
# - CRIBSIDE_LOG_FORMAT

[server]
# Host to bind to
host = "0.0.0.0"

# Port to listen on
port = 8000

# Allowed CORS origins; "*" allows everything
cors_origins = ["*"]

[auth]
# Shared secret devices and viewer apps must present
secret = "dev-secret-change-me"

[hub]
# Upper bound for one subscriber send (ms); 0 disables the bound
send_timeout_ms = 5000

# Drop a device's registry when its last subscriber leaves
evict_empty_devices = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "json"
"#
    .to_string()
}
