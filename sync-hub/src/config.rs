//! Configuration loading for sync-hub.
//!
//! Configuration is loaded from a TOML file (default: `hub.toml`). Every
//! section is optional; missing keys fall back to their defaults.

use serde::Deserialize;
use std::path::PathBuf;
use sync_core::RegistrationCost;

/// Root configuration for sync-hub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Read-through cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Shared secrets.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of the cached latest configuration (default: 30 days).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

/// Shared secrets. All three must be set before the hub will start.
#[derive(Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Key used to sign and verify relay identity tokens.
    #[serde(default)]
    pub identity_secret: String,
    /// Secret relays prove knowledge of when registering.
    #[serde(default)]
    pub registration_secret: String,
    /// Bearer key guarding the admin routes.
    #[serde(default)]
    pub admin_key: String,
    /// Argon2id cost for issued registration tokens.
    #[serde(default)]
    pub registration_cost: RegistrationCost,
}

// Don't leak secrets in debug output
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("identity_secret", &"[REDACTED]")
            .field("registration_secret", &"[REDACTED]")
            .field("admin_key", &"[REDACTED]")
            .field("registration_cost", &self.registration_cost)
            .finish()
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Requests per relay identity per minute (default: 60).
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Requests per second across all relays (default: 100).
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 3600 = 1 hour).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("hub.db")
}

fn default_cache_ttl() -> u64 {
    30 * 24 * 60 * 60 // 30 days in seconds
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_global_requests_per_second() -> u32 {
    100
}

fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            global_requests_per_second: default_global_requests_per_second(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
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

    /// Check values the hub cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let security = &self.security;
        for (name, value) in [
            ("security.identity_secret", &security.identity_secret),
            ("security.registration_secret", &security.registration_secret),
            ("security.admin_key", &security.admin_key),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must be set")));
            }
        }
        if self.limits.requests_per_minute == 0 || self.limits.global_requests_per_second == 0 {
            return Err(ConfigError::Invalid("rate limits must be > 0".into()));
        }
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cleanup.interval_secs must be > 0".into(),
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
