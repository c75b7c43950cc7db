//! Read-through cache for the latest configuration.
//!
//! The cache holds at most one entry: the current configuration. Storage
//! stays authoritative, so every cache failure is recoverable.

use async_trait::async_trait;
use std::time::Duration;
use sync_types::Configuration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache backend errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Trait for latest-configuration caches.
#[async_trait]
pub trait ConfigCache: Send + Sync {
    /// Get the cached configuration, if present and fresh.
    async fn get(&self) -> Result<Option<Configuration>, CacheError>;

    /// Replace the cached configuration.
    async fn set(&self, config: &Configuration) -> Result<(), CacheError>;

    /// Drop the cached configuration.
    async fn invalidate(&self) -> Result<(), CacheError>;
}

/// In-process cache with a fixed time-to-live.
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entry: RwLock<Option<CachedEntry>>,
}

#[derive(Debug)]
struct CachedEntry {
    config: Configuration,
    expires_at: Instant,
}

impl MemoryCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl ConfigCache for MemoryCache {
    async fn get(&self) -> Result<Option<Configuration>, CacheError> {
        let guard = self.entry.read().await;
        Ok(guard
            .as_ref()
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.config.clone()))
    }

    async fn set(&self, config: &Configuration) -> Result<(), CacheError> {
        let mut guard = self.entry.write().await;
        *guard = Some(CachedEntry {
            config: config.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(())
    }

    async fn invalidate(&self) -> Result<(), CacheError> {
        self.entry.write().await.take();
        Ok(())
    }
}
