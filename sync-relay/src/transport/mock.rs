//! Mock transports for testing.
//!
//! [`MockHub`] serves whatever configuration it was last given and
//! [`MockLeaf`] records every push, so engine behaviour can be checked
//! without a network.

use super::{HubApi, LeafApi, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_types::{Configuration, PushPayload};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock hub.
///
/// Returns `NotFound` until a configuration is set.
#[derive(Debug, Default, Clone)]
pub struct MockHub {
    inner: Arc<Mutex<MockHubInner>>,
}

#[derive(Debug, Default)]
struct MockHubInner {
    config: Option<Configuration>,
    credential: Option<String>,
    registrations: Vec<String>,
    fetches: Vec<String>,
    fetch_failures: VecDeque<TransportError>,
    fail_next_register: Option<TransportError>,
}

impl MockHub {
    /// Create a mock hub with no configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `config` on every following fetch.
    pub fn set_config(&self, config: Configuration) {
        lock(&self.inner).config = Some(config);
    }

    /// Stop serving a configuration.
    pub fn clear_config(&self) {
        lock(&self.inner).config = None;
    }

    /// Credential handed out on successful registration.
    pub fn set_credential(&self, credential: &str) {
        lock(&self.inner).credential = Some(credential.to_string());
    }

    /// Cause the next fetch to fail with `error`. Failures queue up.
    pub fn fail_next_fetch(&self, error: TransportError) {
        lock(&self.inner).fetch_failures.push_back(error);
    }

    /// Cause the next registration to fail with `error`.
    pub fn fail_next_register(&self, error: TransportError) {
        lock(&self.inner).fail_next_register = Some(error);
    }

    /// Registration tokens presented so far.
    pub fn registrations(&self) -> Vec<String> {
        lock(&self.inner).registrations.clone()
    }

    /// Number of fetches attempted, failed ones included.
    pub fn fetch_count(&self) -> usize {
        lock(&self.inner).fetches.len()
    }

    /// Credential presented on the most recent fetch.
    pub fn last_credential(&self) -> Option<String> {
        lock(&self.inner).fetches.last().cloned()
    }
}

#[async_trait]
impl HubApi for MockHub {
    async fn register(&self, registration_token: &str) -> Result<String, TransportError> {
        let mut inner = lock(&self.inner);
        inner.registrations.push(registration_token.to_string());

        if let Some(error) = inner.fail_next_register.take() {
            return Err(error);
        }

        Ok(inner
            .credential
            .clone()
            .unwrap_or_else(|| "mock-credential".to_string()))
    }

    async fn fetch_config(&self, credential: &str) -> Result<Configuration, TransportError> {
        let mut inner = lock(&self.inner);
        inner.fetches.push(credential.to_string());

        if let Some(error) = inner.fetch_failures.pop_front() {
            return Err(error);
        }

        inner.config.clone().ok_or_else(|| {
            TransportError::rejected(404, Some("ERR_NOT_FOUND"), "config not found")
        })
    }
}

/// Mock leaf.
#[derive(Debug, Default, Clone)]
pub struct MockLeaf {
    inner: Arc<Mutex<MockLeafInner>>,
}

#[derive(Debug, Default)]
struct MockLeafInner {
    pushes: Vec<PushPayload>,
    attempts: usize,
    fail_next_push: Option<TransportError>,
}

impl MockLeaf {
    /// Create a mock leaf.
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads the leaf acknowledged, oldest first.
    pub fn pushes(&self) -> Vec<PushPayload> {
        lock(&self.inner).pushes.clone()
    }

    /// Most recent acknowledged payload.
    pub fn last_push(&self) -> Option<PushPayload> {
        lock(&self.inner).pushes.last().cloned()
    }

    /// Push attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        lock(&self.inner).attempts
    }

    /// Cause the next push to fail with `error`.
    pub fn fail_next_push(&self, error: TransportError) {
        lock(&self.inner).fail_next_push = Some(error);
    }
}

#[async_trait]
impl LeafApi for MockLeaf {
    async fn push_config(&self, payload: &PushPayload) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);
        inner.attempts += 1;

        if let Some(error) = inner.fail_next_push.take() {
            return Err(error);
        }

        inner.pushes.push(payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sync_types::{ConfigId, ErrorKind, Version};

    fn config(version: u64) -> Configuration {
        Configuration {
            id: ConfigId::new(),
            version: Version::new(version),
            target: "https://example.com/a".into(),
            interval: 30,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn mock_hub_is_empty_until_set() {
        let hub = MockHub::new();
        let err = hub.fetch_config("cred").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let cfg = config(1);
        hub.set_config(cfg.clone());
        assert_eq!(hub.fetch_config("cred").await.unwrap(), cfg);
        assert_eq!(hub.fetch_count(), 2);
        assert_eq!(hub.last_credential().as_deref(), Some("cred"));
    }

    #[tokio::test]
    async fn mock_hub_fails_once() {
        let hub = MockHub::new();
        hub.set_config(config(1));
        hub.fail_next_fetch(TransportError::Timeout);

        assert!(hub.fetch_config("cred").await.is_err());
        assert!(hub.fetch_config("cred").await.is_ok());
    }

    #[tokio::test]
    async fn mock_hub_records_registrations() {
        let hub = MockHub::new();
        hub.set_credential("issued");
        assert_eq!(hub.register("token").await.unwrap(), "issued");
        assert_eq!(hub.registrations(), vec!["token".to_string()]);

        hub.fail_next_register(TransportError::rejected(401, None, "no"));
        assert!(hub.register("token").await.is_err());
    }

    #[tokio::test]
    async fn mock_leaf_records_pushes() {
        let leaf = MockLeaf::new();
        let payload = config(1).to_push();
        leaf.push_config(&payload).await.unwrap();

        leaf.fail_next_push(TransportError::Timeout);
        assert!(leaf.push_config(&payload).await.is_err());

        assert_eq!(leaf.pushes(), vec![payload.clone()]);
        assert_eq!(leaf.last_push(), Some(payload));
        assert_eq!(leaf.attempts(), 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let leaf = MockLeaf::new();
        let clone = leaf.clone();
        clone.push_config(&config(2).to_push()).await.unwrap();
        assert_eq!(leaf.pushes().len(), 1);
    }
}
