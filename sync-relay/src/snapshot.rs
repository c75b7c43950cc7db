//! Local durable state: the relay credential and the last fetched
//! configuration.
//!
//! Both live as small JSON files in the state directory. Writes go to a
//! temporary sibling first and are renamed into place, so a crash never
//! leaves a torn file behind.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use sync_types::Configuration;
use thiserror::Error;

const CREDENTIAL_FILE: &str = "credential.json";
const CONFIG_FILE: &str = "config.json";

/// Snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure.
    #[error("snapshot I/O on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file exists but does not parse.
    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

#[derive(Serialize, Deserialize)]
struct CredentialFile {
    credential_key: String,
}

/// Files under the relay's state directory.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Use `dir` for state. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// State directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the stored credential, if any.
    pub async fn load_credential(&self) -> Result<Option<String>, SnapshotError> {
        let file: Option<CredentialFile> = self.read_json(CREDENTIAL_FILE).await?;
        Ok(file
            .map(|f| f.credential_key)
            .filter(|key| !key.is_empty()))
    }

    /// Persist the credential.
    pub async fn save_credential(&self, credential: &str) -> Result<(), SnapshotError> {
        let file = CredentialFile {
            credential_key: credential.to_string(),
        };
        self.write_json(CREDENTIAL_FILE, &file).await
    }

    /// Load the last configuration snapshot, if any.
    pub async fn load_config(&self) -> Result<Option<Configuration>, SnapshotError> {
        self.read_json(CONFIG_FILE).await
    }

    /// Replace the configuration snapshot.
    pub async fn save_config(&self, config: &Configuration) -> Result<(), SnapshotError> {
        self.write_json(CONFIG_FILE, config).await
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        name: &str,
    ) -> Result<Option<T>, SnapshotError> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SnapshotError::Corrupt { path, source })
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), SnapshotError> {
        self.ensure_dir().await?;

        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let json = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Corrupt {
            path: path.clone(),
            source,
        })?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        set_file_permissions_0600(&tmp).await?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| io_error(&path, source))?;

        tracing::debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }

    async fn ensure_dir(&self) -> Result<(), SnapshotError> {
        if tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| io_error(&self.dir, source))?;
        set_dir_permissions_0700(&self.dir).await
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
async fn set_file_permissions_0600(path: &Path) -> Result<(), SnapshotError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|source| io_error(path, source))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
async fn set_dir_permissions_0700(path: &Path) -> Result<(), SnapshotError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|source| io_error(path, source))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sync_types::{ConfigId, Version};
    use tempfile::tempdir;

    fn config(version: u64) -> Configuration {
        Configuration {
            id: ConfigId::new(),
            version: Version::new(version),
            target: "https://example.com/a".into(),
            interval: 45,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_files_load_as_none() {
        let tmp = tempdir().unwrap();
        let cache = LocalCache::new(tmp.path().join("state"));
        assert!(cache.load_credential().await.unwrap().is_none());
        assert!(cache.load_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn credential_round_trip() {
        let tmp = tempdir().unwrap();
        let cache = LocalCache::new(tmp.path().join("state"));
        cache.save_credential("abc.def").await.unwrap();
        assert_eq!(cache.load_credential().await.unwrap().as_deref(), Some("abc.def"));

        let raw = std::fs::read_to_string(tmp.path().join("state").join(CREDENTIAL_FILE)).unwrap();
        assert!(raw.contains("\"credential_key\""));
    }

    #[tokio::test]
    async fn config_snapshot_replaces_previous() {
        let tmp = tempdir().unwrap();
        let cache = LocalCache::new(tmp.path());
        cache.save_config(&config(1)).await.unwrap();
        let second = config(2);
        cache.save_config(&second).await.unwrap();
        assert_eq!(cache.load_config().await.unwrap(), Some(second));
        assert!(!tmp.path().join("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_credential_is_an_error() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join(CREDENTIAL_FILE), "{not json").unwrap();
        let cache = LocalCache::new(tmp.path());
        let err = cache.load_credential().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn empty_credential_is_treated_as_missing() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join(CREDENTIAL_FILE), r#"{"credential_key":""}"#).unwrap();
        let cache = LocalCache::new(tmp.path());
        assert!(cache.load_credential().await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn snapshot_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("state");
        let cache = LocalCache::new(&dir);
        cache.save_credential("secret").await.unwrap();

        let perms = std::fs::metadata(dir.join(CREDENTIAL_FILE))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");

        let perms = std::fs::metadata(&dir).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "directory should be 0700");
    }
}
