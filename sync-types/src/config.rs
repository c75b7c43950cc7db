//! The configuration object distributed from hub to leaves.

use crate::error::SyncError;
use crate::ids::{ConfigId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Smallest accepted polling interval, in seconds.
pub const MIN_INTERVAL_SECS: u64 = 30;

/// Largest accepted polling interval, in seconds (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// A configuration revision as stored by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Revision identifier.
    pub id: ConfigId,
    /// Hub-assigned version.
    pub version: Version,
    /// URL the leaf acts against.
    pub target: String,
    /// Polling interval in seconds.
    pub interval: u64,
    /// When this revision was created.
    pub created_at: DateTime<Utc>,
}

impl Configuration {
    /// The polling interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Whether `other` carries the same target and interval.
    pub fn same_settings(&self, other: &Configuration) -> bool {
        self.target == other.target && self.interval == other.interval
    }

    /// Body sent from the relay to the leaf.
    pub fn to_push(&self) -> PushPayload {
        PushPayload {
            id: self.id,
            version: self.version,
            target: self.target.clone(),
            interval: self.interval,
        }
    }
}

/// Configuration body pushed to a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Revision identifier.
    pub id: ConfigId,
    /// Hub-assigned version.
    pub version: Version,
    /// URL the leaf acts against.
    pub target: String,
    /// Polling interval in seconds.
    pub interval: u64,
}

impl PushPayload {
    /// Check the payload before a leaf accepts it.
    pub fn validate(&self) -> Result<(), SyncError> {
        validate_target(&self.target)?;
        let interval = i64::try_from(self.interval).unwrap_or(i64::MAX);
        validate_interval(interval)?;
        Ok(())
    }
}

/// Admin request to create a new revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConfiguration {
    /// URL the leaf acts against.
    pub target: String,
    /// Polling interval in seconds.
    pub interval: i64,
}

impl NewConfiguration {
    /// Validate and normalise into `(target, interval)`.
    pub fn validate(&self) -> Result<(String, u64), SyncError> {
        validate_target(&self.target)?;
        let interval = validate_interval(self.interval)?;
        Ok((self.target.clone(), interval))
    }
}

/// Admin request to update the current revision in place.
///
/// An empty `target` and a negative `interval` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationPatch {
    /// Replacement target, if any.
    #[serde(default)]
    pub target: Option<String>,
    /// Replacement interval, if any.
    #[serde(default)]
    pub interval: Option<i64>,
}

impl ConfigurationPatch {
    /// Apply this patch to `current`, returning the updated settings.
    pub fn apply_to(&self, current: &Configuration) -> Result<(String, u64), SyncError> {
        let target = match self.target.as_deref() {
            Some(t) if !t.is_empty() => {
                validate_target(t)?;
                t.to_string()
            }
            _ => current.target.clone(),
        };
        let interval = match self.interval {
            Some(i) if i >= 0 => validate_interval(i)?,
            _ => current.interval,
        };
        Ok((target, interval))
    }
}

/// Reject intervals outside [`MIN_INTERVAL_SECS`]..=[`MAX_INTERVAL_SECS`].
pub fn validate_interval(interval: i64) -> Result<u64, SyncError> {
    match u64::try_from(interval) {
        Ok(secs) if (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) => Ok(secs),
        _ => Err(SyncError::ValidationFailed(format!(
            "interval must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds, got {interval}"
        ))),
    }
}

/// Require an absolute http(s) URL with a host.
pub fn validate_target(target: &str) -> Result<(), SyncError> {
    if target.is_empty() {
        return Err(SyncError::ValidationFailed("target is required".into()));
    }
    let url = Url::parse(target).map_err(|e| {
        SyncError::ValidationFailed(format!("target is not a valid URL ({e}): {target}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SyncError::ValidationFailed(format!(
            "target must be an http(s) URL: {target}"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(SyncError::ValidationFailed(format!(
            "target has no host: {target}"
        )));
    }
    Ok(())
}
