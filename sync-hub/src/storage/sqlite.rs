//! SQLite storage backend for sync-hub.

use super::{ConfigStorage, NewRevision};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use sync_types::{ConfigId, Configuration, RelayId, Version};

/// SQLite-based configuration storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // One connection that never recycles: the database dies with it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS configurations (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL UNIQUE,
                target TEXT NOT NULL,
                interval_secs INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relays (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStorage for SqliteStorage {
    async fn latest(&self) -> Result<Option<Configuration>, StorageError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT id, version, target, interval_secs, created_at
            FROM configurations
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_next(&self, revision: NewRevision) -> Result<Configuration, StorageError> {
        // Version assignment and insert happen in one statement; the UNIQUE
        // constraint rejects any concurrent writer that computed the same max.
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            INSERT INTO configurations (id, version, target, interval_secs, created_at)
            SELECT ?1, COALESCE(MAX(version), 0) + 1, ?2, ?3, ?4 FROM configurations
            RETURNING id, version, target, interval_secs, created_at
            "#,
        )
        .bind(revision.id.to_string())
        .bind(&revision.target)
        .bind(revision.interval as i64)
        .bind(format_timestamp(revision.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.try_into()
    }

    async fn update_latest(
        &self,
        target: &str,
        interval: u64,
    ) -> Result<Option<Configuration>, StorageError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            UPDATE configurations
            SET target = ?1, interval_secs = ?2
            WHERE version = (SELECT MAX(version) FROM configurations)
            RETURNING id, version, target, interval_secs, created_at
            "#,
        )
        .bind(target)
        .bind(interval as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn revision_count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM configurations")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(count as u64)
    }

    async fn insert_relay(
        &self,
        relay_id: &RelayId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO relays (id, created_at) VALUES (?1, ?2)")
            .bind(relay_id.to_string())
            .bind(format_timestamp(created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(())
    }

    async fn relay_exists(&self, relay_id: &RelayId) -> Result<bool, StorageError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM relays WHERE id = ?1")
            .bind(relay_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(found.is_some())
    }

    async fn relay_count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relays")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(count as u64)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct ConfigRow {
    id: String,
    version: i64,
    target: String,
    interval_secs: i64,
    created_at: String,
}

impl TryFrom<ConfigRow> for Configuration {
    type Error = StorageError;

    fn try_from(row: ConfigRow) -> Result<Self, Self::Error> {
        let id = ConfigId::parse(&row.id)
            .ok_or_else(|| StorageError::CorruptRow(format!("invalid config id: {}", row.id)))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| StorageError::CorruptRow(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc);
        let version = u64::try_from(row.version)
            .map_err(|_| StorageError::CorruptRow(format!("negative version: {}", row.version)))?;
        let interval = u64::try_from(row.interval_secs).map_err(|_| {
            StorageError::CorruptRow(format!("negative interval: {}", row.interval_secs))
        })?;

        Ok(Configuration {
            id,
            version: Version::new(version),
            target: row.target,
            interval,
            created_at,
        })
    }
}
