//! Version-authoritative configuration store.
//!
//! Combines durable storage with the read-through cache. Storage decides
//! versions; the cache only ever mirrors what storage returned.
//!
//! Cache writes go through one gate. Every completed write bumps the gate's
//! generation and republishes the latest row; a cache-miss read only
//! repopulates when no write finished while it was reading storage.

use crate::cache::ConfigCache;
use crate::error::{HubError, Result};
use crate::storage::{ConfigStorage, NewRevision};
use chrono::Utc;
use std::sync::Arc;
use sync_types::{ConfigId, Configuration, ConfigurationPatch, NewConfiguration};
use tokio::sync::Mutex;

/// The hub's view of the current configuration.
#[derive(Clone)]
pub struct VersionStore {
    storage: Arc<dyn ConfigStorage>,
    cache: Arc<dyn ConfigCache>,
    generation: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore").finish_non_exhaustive()
    }
}

impl VersionStore {
    /// Create a store over the given backends.
    pub fn new(storage: Arc<dyn ConfigStorage>, cache: Arc<dyn ConfigCache>) -> Self {
        Self {
            storage,
            cache,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Current configuration, or `NotFound` if none was ever created.
    pub async fn get_latest(&self) -> Result<Configuration> {
        match self.cache.get().await {
            Ok(Some(config)) => return Ok(config),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Cache read failed, falling back to storage"),
        }

        let seen = *self.generation.lock().await;
        let config = self
            .storage
            .latest()
            .await?
            .ok_or(HubError::NotFound { resource: "config" })?;

        let generation = self.generation.lock().await;
        if *generation == seen {
            self.refresh_cache(&config).await;
        } else {
            tracing::debug!(version = %config.version, "Write raced cache repopulate, skipping");
        }
        Ok(config)
    }

    /// Create a new revision with the next version.
    pub async fn create(&self, request: NewConfiguration) -> Result<Configuration> {
        let (target, interval) = request.validate()?;
        let config = self
            .storage
            .insert_next(NewRevision {
                id: ConfigId::new(),
                target,
                interval,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            version = %config.version,
            target = %config.target,
            interval = config.interval,
            "Configuration created"
        );
        self.publish().await;
        Ok(config)
    }

    /// Edit the current revision in place. The version does not change.
    pub async fn update(&self, patch: ConfigurationPatch) -> Result<Configuration> {
        let current = self
            .storage
            .latest()
            .await?
            .ok_or(HubError::NotFound { resource: "config" })?;
        let (target, interval) = patch.apply_to(&current)?;

        let config = self
            .storage
            .update_latest(&target, interval)
            .await?
            .ok_or(HubError::NotFound { resource: "config" })?;

        tracing::info!(
            version = %config.version,
            target = %config.target,
            interval = config.interval,
            "Configuration updated in place"
        );
        self.publish().await;
        Ok(config)
    }

    /// Number of stored revisions.
    pub async fn revision_count(&self) -> Result<u64> {
        Ok(self.storage.revision_count().await?)
    }

    /// Mirror storage into the cache after a completed write.
    ///
    /// The latest row is re-read under the gate so concurrent writers
    /// publish in commit order.
    async fn publish(&self) {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        match self.storage.latest().await {
            Ok(Some(latest)) => self.refresh_cache(&latest).await,
            Ok(None) => self.drop_cache().await,
            Err(e) => {
                tracing::warn!(error = %e, "Re-read after write failed, dropping cache");
                self.drop_cache().await;
            }
        }
    }

    async fn drop_cache(&self) {
        if let Err(e) = self.cache.invalidate().await {
            tracing::warn!(error = %e, "Cache invalidation failed");
        }
    }

    async fn refresh_cache(&self, config: &Configuration) {
        if let Err(e) = self.cache.set(config).await {
            tracing::warn!(error = %e, version = %config.version, "Cache refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryCache};
    use crate::error::StorageError;
    use crate::storage::SqliteStorage;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use sync_types::{RelayId, Version};
    use tokio::sync::oneshot;

    /// A cache that always fails.
    struct BrokenCache {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ConfigCache for BrokenCache {
        async fn get(&self) -> std::result::Result<Option<Configuration>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("down".into()))
        }
        async fn set(&self, _: &Configuration) -> std::result::Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("down".into()))
        }
        async fn invalidate(&self) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    type Hold = (oneshot::Sender<()>, oneshot::Receiver<()>);

    /// Storage whose next `latest` read parks after reading until released.
    struct GatedStorage {
        inner: SqliteStorage,
        hold: std::sync::Mutex<Option<Hold>>,
    }

    impl GatedStorage {
        async fn new() -> Self {
            Self {
                inner: SqliteStorage::in_memory().await.unwrap(),
                hold: std::sync::Mutex::new(None),
            }
        }

        /// Returns (signalled once the read happened, release).
        fn arm(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (read_tx, read_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            *self.hold.lock().unwrap() = Some((read_tx, release_rx));
            (read_rx, release_tx)
        }
    }

    #[async_trait]
    impl ConfigStorage for GatedStorage {
        async fn latest(&self) -> std::result::Result<Option<Configuration>, StorageError> {
            let config = self.inner.latest().await?;
            let hold = self.hold.lock().unwrap().take();
            if let Some((read, release)) = hold {
                let _ = read.send(());
                let _ = release.await;
            }
            Ok(config)
        }
        async fn insert_next(
            &self,
            revision: NewRevision,
        ) -> std::result::Result<Configuration, StorageError> {
            self.inner.insert_next(revision).await
        }
        async fn update_latest(
            &self,
            target: &str,
            interval: u64,
        ) -> std::result::Result<Option<Configuration>, StorageError> {
            self.inner.update_latest(target, interval).await
        }
        async fn revision_count(&self) -> std::result::Result<u64, StorageError> {
            self.inner.revision_count().await
        }
        async fn insert_relay(
            &self,
            relay_id: &RelayId,
            created_at: DateTime<Utc>,
        ) -> std::result::Result<(), StorageError> {
            self.inner.insert_relay(relay_id, created_at).await
        }
        async fn relay_exists(&self, relay_id: &RelayId) -> std::result::Result<bool, StorageError> {
            self.inner.relay_exists(relay_id).await
        }
        async fn relay_count(&self) -> std::result::Result<u64, StorageError> {
            self.inner.relay_count().await
        }
    }

    async fn gated_store() -> (VersionStore, Arc<GatedStorage>, Arc<MemoryCache>) {
        let storage = Arc::new(GatedStorage::new().await);
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        (
            VersionStore::new(storage.clone(), cache.clone()),
            storage,
            cache,
        )
    }

    async fn store() -> (VersionStore, Arc<MemoryCache>) {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        (VersionStore::new(storage, cache.clone()), cache)
    }

    fn create_req(target: &str, interval: i64) -> NewConfiguration {
        NewConfiguration {
            target: target.into(),
            interval,
        }
    }

    #[tokio::test]
    async fn empty_store_is_not_found() {
        let (store, _) = store().await;
        assert!(matches!(
            store.get_latest().await,
            Err(HubError::NotFound { resource: "config" })
        ));
    }

    #[tokio::test]
    async fn create_assigns_increasing_versions() {
        let (store, _) = store().await;
        let first = store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();
        let second = store
            .create(create_req("https://example.com/b", 60))
            .await
            .unwrap();

        assert_eq!(first.version, Version::new(1));
        assert_eq!(second.version, Version::new(2));
        assert_ne!(first.id, second.id);
        assert_eq!(store.get_latest().await.unwrap(), second);
    }

    #[tokio::test]
    async fn create_populates_cache() {
        let (store, cache) = store().await;
        let created = store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();
        assert_eq!(cache.get().await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn interval_floor_enforced() {
        let (store, _) = store().await;
        assert!(matches!(
            store.create(create_req("https://example.com/a", 29)).await,
            Err(HubError::Validation(_))
        ));
        assert!(store
            .create(create_req("https://example.com/a", 30))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn empty_target_rejected() {
        let (store, _) = store().await;
        assert!(matches!(
            store.create(create_req("", 30)).await,
            Err(HubError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_without_config_is_not_found() {
        let (store, _) = store().await;
        let err = store
            .update(ConfigurationPatch {
                target: Some("https://example.com/b".into()),
                interval: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_keeps_version_and_refreshes_cache() {
        let (store, cache) = store().await;
        let created = store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();

        let updated = store
            .update(ConfigurationPatch {
                target: None,
                interval: Some(120),
            })
            .await
            .unwrap();

        assert_eq!(updated.version, created.version);
        assert_eq!(updated.interval, 120);
        assert_eq!(updated.target, created.target);
        assert_eq!(cache.get().await.unwrap(), Some(updated.clone()));
        assert_eq!(store.get_latest().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_ignores_negative_interval() {
        let (store, _) = store().await;
        store
            .create(create_req("https://example.com/a", 45))
            .await
            .unwrap();
        let updated = store
            .update(ConfigurationPatch {
                target: Some("https://example.com/b".into()),
                interval: Some(-5),
            })
            .await
            .unwrap();
        assert_eq!(updated.interval, 45);
        assert_eq!(updated.target, "https://example.com/b");
    }

    #[tokio::test]
    async fn update_rejects_small_interval() {
        let (store, _) = store().await;
        store
            .create(create_req("https://example.com/a", 45))
            .await
            .unwrap();
        let err = store
            .update(ConfigurationPatch {
                target: None,
                interval: Some(10),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn versions_never_decrease() {
        let (store, _) = store().await;
        let mut last = Version::zero();
        for step in 0..10 {
            let config = if step % 3 == 2 {
                store
                    .update(ConfigurationPatch {
                        target: None,
                        interval: Some(30 + step),
                    })
                    .await
                    .unwrap()
            } else {
                store
                    .create(create_req("https://example.com/a", 30))
                    .await
                    .unwrap()
            };
            let latest = store.get_latest().await.unwrap();
            assert_eq!(latest, config);
            if step % 3 == 2 {
                assert_eq!(latest.version, last);
            } else {
                assert!(latest.version > last);
            }
            last = latest.version;
        }
    }

    #[tokio::test]
    async fn broken_cache_falls_through_to_storage() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let cache = Arc::new(BrokenCache {
            calls: AtomicU32::new(0),
        });
        let store = VersionStore::new(storage, cache.clone());

        let created = store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();
        assert_eq!(store.get_latest().await.unwrap(), created);
        assert!(cache.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn cache_miss_repopulates() {
        let (store, cache) = store().await;
        store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();
        cache.invalidate().await.unwrap();

        let latest = store.get_latest().await.unwrap();
        assert_eq!(cache.get().await.unwrap(), Some(latest));
    }

    #[tokio::test]
    async fn create_during_cache_miss_is_not_shadowed() {
        let (store, storage, cache) = gated_store().await;
        let v1 = store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();
        cache.invalidate().await.unwrap();

        let (read, release) = storage.arm();
        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.get_latest().await })
        };
        read.await.unwrap();

        let v2 = store
            .create(create_req("https://example.com/b", 60))
            .await
            .unwrap();
        release.send(()).unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), v1);
        assert_eq!(cache.get().await.unwrap(), Some(v2.clone()));
        assert_eq!(store.get_latest().await.unwrap(), v2);
    }

    #[tokio::test]
    async fn update_during_cache_miss_is_not_shadowed() {
        let (store, storage, cache) = gated_store().await;
        store
            .create(create_req("https://example.com/a", 30))
            .await
            .unwrap();
        cache.invalidate().await.unwrap();

        let (read, release) = storage.arm();
        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.get_latest().await })
        };
        read.await.unwrap();

        let updated = store
            .update(ConfigurationPatch {
                target: None,
                interval: Some(90),
            })
            .await
            .unwrap();
        release.send(()).unwrap();

        assert_eq!(reader.await.unwrap().unwrap().interval, 30);
        assert_eq!(store.get_latest().await.unwrap(), updated);
    }
}
