//! Configuration loading for sync-leaf.
//!
//! Configuration is loaded from a TOML file (default: `leaf.toml`).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for sync-leaf.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Push authentication.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Task requests against the configured target.
    #[serde(default)]
    pub task: TaskConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address (default: 0.0.0.0:9090).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Push authentication.
#[derive(Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Bearer key relays present on `POST /config`.
    #[serde(default)]
    pub push_key: String,
}

/// Task request configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Request timeout, in seconds (default: 30).
    #[serde(default = "default_task_timeout")]
    pub timeout_secs: u64,
    /// User-Agent sent with task requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Accept self-signed or otherwise invalid certificates. Development only.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_task_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "curl/7.81.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_task_timeout(),
            user_agent: default_user_agent(),
            accept_invalid_certs: false,
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("push_key", &"[REDACTED]")
            .finish()
    }
}

impl TaskConfig {
    /// Task timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check values the leaf cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.push_key.is_empty() {
            return Err(ConfigError::Invalid("security.push_key must be set".into()));
        }
        if self.task.timeout_secs == 0 {
            return Err(ConfigError::Invalid("task.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is missing or out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
