//! The leaf's current configuration.
//!
//! Every accepted push overwrites the held configuration wholesale. The
//! leaf does not arbitrate between relays: the last push wins, even when it
//! carries a lower version than the one it replaces.

use crate::error::{LeafError, Result};
use sync_types::{PushPayload, Version};
use tokio::sync::RwLock;

/// What an apply replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Nothing was held before.
    First,
    /// Replaced an equal or lower version.
    Replaced {
        /// Version previously held.
        previous: Version,
    },
    /// Replaced a higher version.
    Regressed {
        /// Version previously held.
        previous: Version,
    },
}

/// Holds the configuration pushed by a relay.
#[derive(Debug, Default)]
pub struct ConfigHolder {
    current: RwLock<Option<PushPayload>>,
}

impl ConfigHolder {
    /// Create an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held configuration with `candidate`.
    pub async fn apply(&self, candidate: PushPayload) -> Applied {
        let version = candidate.version;
        let previous = self.current.write().await.replace(candidate);

        match previous.map(|p| p.version) {
            None => {
                tracing::info!(%version, "Configuration applied");
                Applied::First
            }
            Some(previous) if previous > version => {
                tracing::warn!(%previous, %version, "Accepted configuration with a lower version");
                Applied::Regressed { previous }
            }
            Some(previous) => {
                tracing::info!(%previous, %version, "Configuration applied");
                Applied::Replaced { previous }
            }
        }
    }

    /// The held configuration.
    pub async fn read(&self) -> Result<PushPayload> {
        self.current.read().await.clone().ok_or(LeafError::NotSet)
    }

    /// The held target URL. The lock is released before this returns.
    pub async fn target(&self) -> Result<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| c.target.clone())
            .ok_or(LeafError::NotSet)
    }

    /// Version of the held configuration, if any.
    pub async fn version(&self) -> Option<Version> {
        self.current.read().await.as_ref().map(|c| c.version)
    }
}
