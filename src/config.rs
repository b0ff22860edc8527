//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::client::KeenProject;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Project the client queries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub read_key: String,
}

impl ProjectConfig {
    pub fn to_project(&self) -> KeenProject {
        KeenProject::new(self.id.clone(), self.read_key.clone())
    }

    /// Fail unless both the project id and read key are set
    pub fn require(&self) -> Result<KeenProject, ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::Missing("project.id"));
        }
        if self.read_key.is_empty() {
            return Err(ConfigError::Missing("project.read_key"));
        }
        Ok(self.to_project())
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    crate::client::DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
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

    /// Log every outgoing request body and URL
    #[serde(default)]
    pub log_requests: bool,
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
            log_requests: false,
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

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
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
            dirs::config_dir().map(|p| p.join("keen-query").join("config.toml")),
            Some(PathBuf::from("./keen-query.toml")),
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

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Project overrides
        if let Some(id) = lookup("KEEN_PROJECT_ID") {
            self.project.id = id;
        }
        if let Some(read_key) = lookup("KEEN_READ_KEY") {
            self.project.read_key = read_key;
        }

        // Client overrides
        if let Some(base_url) = lookup("KEEN_BASE_URL") {
            self.client.base_url = base_url;
        }
        if let Some(timeout) = lookup("KEEN_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.client.request_timeout_secs = secs;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("KEEN_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("KEEN_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(flag) = lookup("KEEN_LOG_REQUESTS") {
            self.logging.log_requests = matches!(flag.as_str(), "1" | "true" | "yes" | "on");
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

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Keen Query Configuration
#
# Environment variables override these settings:
# - KEEN_PROJECT_ID
# - KEEN_READ_KEY
# - KEEN_BASE_URL
# - KEEN_TIMEOUT_SECS
# - KEEN_LOG_LEVEL
# - KEEN_LOG_FORMAT
# - KEEN_LOG_REQUESTS

[project]
# Project to query
id = ""

# Read key of the project
read_key = ""

[client]
# API address
base_url = "https://api.keen.io"

# Request timeout in seconds
request_timeout_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Log every outgoing request body and URL
log_requests = false
"#
    .to_string()
}
