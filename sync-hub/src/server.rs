//! Main Hub coordination.
//!
//! Hub owns the version store, the relay registry, the rate limiters, and
//! the operational counters. HTTP handlers reach it through an `Arc`.

use crate::cache::{ConfigCache, MemoryCache};
use crate::config::Config;
use crate::error::{HubError, Result};
use crate::limits::RateLimits;
use crate::registry::Registry;
use crate::storage::{ConfigStorage, SqliteStorage};
use crate::store::VersionStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_core::SharedSecret;

/// Operational metrics for monitoring hub activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Configuration fetches served to relays.
    pub config_fetches_total: AtomicU64,
    /// Relays registered.
    pub registrations_total: AtomicU64,
    /// Revisions created through the admin surface.
    pub configs_created_total: AtomicU64,
    /// In-place updates through the admin surface.
    pub configs_updated_total: AtomicU64,
    /// Rejected credentials (identity, registration, admin).
    pub auth_failures_total: AtomicU64,
    /// Rate limit rejections (per relay + global).
    pub rate_limit_hits_total: AtomicU64,
    /// Requests that ended in a server error.
    pub errors_total: AtomicU64,
}

impl HubMetrics {
    /// Increment a counter.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Main hub server.
pub struct Hub {
    config: Config,
    store: VersionStore,
    registry: Registry,
    admin_key: SharedSecret,
    rate_limits: RateLimits,
    metrics: HubMetrics,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Create a hub over SQLite storage with an in-memory cache.
    pub fn new(config: Config, storage: SqliteStorage) -> Result<Self> {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(config.cache.ttl_secs)));
        Self::with_backends(config, Arc::new(storage), cache)
    }

    /// Create a hub over arbitrary storage and cache backends.
    pub fn with_backends(
        config: Config,
        storage: Arc<dyn ConfigStorage>,
        cache: Arc<dyn ConfigCache>,
    ) -> Result<Self> {
        config.validate().map_err(HubError::Config)?;

        let security = &config.security;
        let registry = Registry::new(
            storage.clone(),
            SharedSecret::from(security.identity_secret.as_str()),
            &security.registration_secret,
            security.registration_cost,
        );
        let admin_key = SharedSecret::from(security.admin_key.as_str());
        let rate_limits = RateLimits::new(&config.limits);

        Ok(Self {
            store: VersionStore::new(storage, cache),
            registry,
            admin_key,
            rate_limits,
            metrics: HubMetrics::default(),
            config,
        })
    }

    /// Get the hub configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the version store.
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Get the relay registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    /// Check a presented admin bearer key in constant time.
    pub fn is_admin(&self, presented: &str) -> bool {
        self.admin_key.matches(presented.as_bytes())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sync_core::RegistrationCost;

    /// Config with secrets set and cheap hashing.
    pub(crate) fn test_config() -> Config {
        let mut config = Config::default();
        config.security.identity_secret = "identity-secret".into();
        config.security.registration_secret = "registration-secret".into();
        config.security.admin_key = "admin-key".into();
        config.security.registration_cost = RegistrationCost::minimal();
        config
    }

    pub(crate) async fn test_hub() -> Arc<Hub> {
        let storage = SqliteStorage::in_memory().await.unwrap();
        Arc::new(Hub::new(test_config(), storage).unwrap())
    }

    #[tokio::test]
    async fn hub_requires_secrets() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let err = Hub::new(Config::default(), storage).unwrap_err();
        assert!(matches!(err, HubError::Config(_)));
    }

    #[tokio::test]
    async fn admin_key_check() {
        let hub = test_hub().await;
        assert!(hub.is_admin("admin-key"));
        assert!(!hub.is_admin("admin-key2"));
        assert!(!hub.is_admin(""));
    }

    #[test]
    fn metrics_increment() {
        let metrics = HubMetrics::default();
        HubMetrics::incr(&metrics.config_fetches_total);
        HubMetrics::incr(&metrics.config_fetches_total);
        assert_eq!(metrics.config_fetches_total.load(Ordering::Relaxed), 2);
    }
}
