//! Relay registration and authentication.

use crate::error::{HubError, Result};
use crate::storage::ConfigStorage;
use chrono::Utc;
use std::sync::Arc;
use sync_core::{
    issue, issue_registration_token, verify, verify_registration_token, IdentityError,
    RegistrationCost, SharedSecret, Verification,
};
use sync_types::RelayId;

/// Issues and checks relay credentials.
#[derive(Clone)]
pub struct Registry {
    storage: Arc<dyn ConfigStorage>,
    identity_secret: SharedSecret,
    registration_secret: Arc<str>,
    cost: RegistrationCost,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("identity_secret", &self.identity_secret)
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create a registry.
    pub fn new(
        storage: Arc<dyn ConfigStorage>,
        identity_secret: SharedSecret,
        registration_secret: &str,
        cost: RegistrationCost,
    ) -> Self {
        Self {
            storage,
            identity_secret,
            registration_secret: Arc::from(registration_secret),
            cost,
        }
    }

    /// Produce a fresh registration token for operators to hand to relays.
    pub async fn registration_token(&self) -> Result<String> {
        let secret = self.registration_secret.clone();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || issue_registration_token(&secret, &cost))
            .await
            .map_err(|e| HubError::Token(e.to_string()))?
            .map_err(|e| HubError::Token(e.to_string()))
    }

    /// Register a relay presenting `registration_token`.
    ///
    /// Returns the signed identity token the relay must use from now on.
    pub async fn register(&self, registration_token: &str) -> Result<(RelayId, String)> {
        let secret = self.registration_secret.clone();
        let token = registration_token.to_string();
        let cost = self.cost;
        let accepted =
            tokio::task::spawn_blocking(move || verify_registration_token(&token, &secret, &cost))
                .await
                .map_err(|e| HubError::Token(e.to_string()))?;
        if !accepted {
            return Err(HubError::Unauthorized("invalid registration token".into()));
        }

        let relay_id = RelayId::new();
        self.storage.insert_relay(&relay_id, Utc::now()).await?;
        let credential = issue(&relay_id.to_string(), &self.identity_secret)
            .map_err(|e| HubError::Token(e.to_string()))?;

        tracing::info!(relay = %relay_id, "Relay registered");
        Ok((relay_id, credential))
    }

    /// Check a presented identity token without touching storage.
    pub fn authenticate(&self, token: &str) -> Result<RelayId> {
        match verify(token, &self.identity_secret) {
            Ok(Verification::Valid(identity)) => RelayId::parse(&identity)
                .ok_or_else(|| HubError::Unauthorized("identity is not a relay id".into())),
            Ok(Verification::Invalid) => Err(HubError::Unauthorized("invalid signature".into())),
            Err(IdentityError::Malformed(reason)) => {
                Err(HubError::Unauthorized(format!("malformed token: {reason}")))
            }
            Err(e) => Err(HubError::Token(e.to_string())),
        }
    }

    /// Confirm the relay was legitimately registered.
    pub async fn ensure_registered(&self, relay_id: &RelayId) -> Result<()> {
        if self.storage.relay_exists(relay_id).await? {
            Ok(())
        } else {
            Err(HubError::NotFound { resource: "relay" })
        }
    }

    /// Number of registered relays.
    pub async fn relay_count(&self) -> Result<u64> {
        Ok(self.storage.relay_count().await?)
    }
}
