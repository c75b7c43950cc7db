//! Configuration loading for sync-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for sync-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Upstream hub.
    #[serde(default)]
    pub hub: HubConfig,
    /// Downstream leaf.
    #[serde(default)]
    pub leaf: LeafConfig,
    /// Polling behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Upstream hub configuration.
#[derive(Clone, Deserialize)]
pub struct HubConfig {
    /// Base URL of the hub (default: http://127.0.0.1:8080).
    #[serde(default = "default_hub_url")]
    pub url: String,
    /// Registration token issued by the hub operator.
    #[serde(default)]
    pub registration_token: String,
    /// Timeout for each fetch, in seconds (default: 30).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

/// Downstream leaf configuration.
#[derive(Clone, Deserialize)]
pub struct LeafConfig {
    /// Base URL of the leaf (default: http://127.0.0.1:9090).
    #[serde(default = "default_leaf_url")]
    pub url: String,
    /// Shared bearer key the leaf expects on pushes.
    #[serde(default)]
    pub key: String,
    /// Timeout for each push, in seconds (default: 10).
    #[serde(default = "default_push_timeout")]
    pub push_timeout_secs: u64,
}

/// Polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Directory holding credential.json and config.json.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Delay between initial fetch attempts, in seconds (default: 30).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    /// Unchanged polls before a forced repush (default: 3).
    #[serde(default = "default_heartbeat_threshold")]
    pub heartbeat_threshold: u32,
}

// Default value functions
fn default_hub_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_leaf_url() -> String {
    "http://127.0.0.1:9090".to_string()
}

fn default_push_timeout() -> u64 {
    10
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_retry_backoff() -> u64 {
    30
}

fn default_heartbeat_threshold() -> u32 {
    sync_core::DEFAULT_HEARTBEAT_THRESHOLD
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: default_hub_url(),
            registration_token: String::new(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self {
            url: default_leaf_url(),
            key: String::new(),
            push_timeout_secs: default_push_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            retry_backoff_secs: default_retry_backoff(),
            heartbeat_threshold: default_heartbeat_threshold(),
        }
    }
}

// Don't leak secrets in debug output
impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("url", &self.url)
            .field("registration_token", &"[REDACTED]")
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for LeafConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafConfig")
            .field("url", &self.url)
            .field("key", &"[REDACTED]")
            .field("push_timeout_secs", &self.push_timeout_secs)
            .finish()
    }
}

impl HubConfig {
    /// Fetch timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl LeafConfig {
    /// Push timeout as a [`Duration`].
    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

impl SyncConfig {
    /// Initial-sync backoff as a [`Duration`].
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
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

    /// Check values the relay cannot run without.
    ///
    /// The registration token may be empty when a credential is already
    /// on disk; the engine reports that case itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.leaf.key.is_empty() {
            return Err(ConfigError::Invalid("leaf.key must be set".into()));
        }
        for (name, url) in [("hub.url", &self.hub.url), ("leaf.url", &self.leaf.url)] {
            sync_types::validate_target(url)
                .map_err(|e| ConfigError::Invalid(format!("{name}: {e}")))?;
        }
        if self.hub.fetch_timeout_secs == 0 || self.leaf.push_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be > 0".into()));
        }
        if self.sync.retry_backoff_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.retry_backoff_secs must be > 0".into(),
            ));
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
