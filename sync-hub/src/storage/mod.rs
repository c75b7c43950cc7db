//! Storage layer for sync-hub.
//!
//! Provides durable configuration revisions with hub-assigned versions and
//! the set of registered relay identities.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sync_types::{ConfigId, Configuration, RelayId};

/// Request to store a new configuration revision.
#[derive(Debug, Clone)]
pub struct NewRevision {
    /// Identifier for the revision.
    pub id: ConfigId,
    /// Validated target URL.
    pub target: String,
    /// Validated interval in seconds.
    pub interval: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Trait for configuration storage backends.
#[async_trait]
pub trait ConfigStorage: Send + Sync {
    /// Get the configuration with the highest version, if any.
    async fn latest(&self) -> Result<Option<Configuration>, StorageError>;

    /// Store a revision and assign it the next version.
    ///
    /// The version must be computed atomically with the insert.
    async fn insert_next(&self, revision: NewRevision) -> Result<Configuration, StorageError>;

    /// Overwrite target and interval of the latest revision in place.
    ///
    /// Returns `None` if no revision exists.
    async fn update_latest(
        &self,
        target: &str,
        interval: u64,
    ) -> Result<Option<Configuration>, StorageError>;

    /// Count stored revisions.
    async fn revision_count(&self) -> Result<u64, StorageError>;

    /// Record a newly registered relay.
    async fn insert_relay(
        &self,
        relay_id: &RelayId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Whether a relay id was registered.
    async fn relay_exists(&self, relay_id: &RelayId) -> Result<bool, StorageError>;

    /// Count registered relays.
    async fn relay_count(&self) -> Result<u64, StorageError>;
}
