//! Bearer credential extractors.
//!
//! Three kinds of caller reach the hub: relays holding a signed identity,
//! relays registering for the first time, and operators with the admin key.

use crate::error::HubError;
use crate::server::{Hub, HubMetrics};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;
use sync_types::RelayId;

/// A relay whose identity token verified and who is within rate limits.
#[derive(Debug, Clone, Copy)]
pub struct RelayIdentity(pub RelayId);

/// The raw registration token presented by a relay.
#[derive(Debug, Clone)]
pub struct RegistrationBearer(pub String);

/// Proof that the caller holds the admin key.
#[derive(Debug, Clone, Copy)]
pub struct AdminBearer;

fn hub(parts: &Parts) -> Result<Arc<Hub>, HubError> {
    parts
        .extensions
        .get::<Arc<Hub>>()
        .cloned()
        .ok_or_else(|| HubError::Token("hub extension missing".into()))
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer(parts: &Parts) -> Result<&str, HubError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| HubError::Unauthorized("missing authorization header".into()))?
        .to_str()
        .map_err(|_| HubError::Unauthorized("authorization header is not ASCII".into()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(HubError::Unauthorized("expected a bearer token".into()));
    }
    Ok(token)
}

fn check_global(hub: &Hub) -> Result<(), HubError> {
    hub.rate_limits().check_global().map_err(|e| {
        HubMetrics::incr(&hub.metrics().rate_limit_hits_total);
        HubError::RateLimited {
            reason: e.to_string(),
        }
    })
}

fn auth_failure(hub: &Hub, err: HubError) -> HubError {
    if matches!(err, HubError::Unauthorized(_)) {
        HubMetrics::incr(&hub.metrics().auth_failures_total);
    }
    err
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RelayIdentity {
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let hub = hub(parts)?;
        check_global(&hub)?;

        let token = bearer(parts).map_err(|e| auth_failure(&hub, e))?;
        let relay_id = hub
            .registry()
            .authenticate(token)
            .map_err(|e| auth_failure(&hub, e))?;

        hub.rate_limits().check_relay(&relay_id).map_err(|e| {
            HubMetrics::incr(&hub.metrics().rate_limit_hits_total);
            HubError::RateLimited {
                reason: e.to_string(),
            }
        })?;

        Ok(RelayIdentity(relay_id))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RegistrationBearer {
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let hub = hub(parts)?;
        check_global(&hub)?;
        let token = bearer(parts).map_err(|e| auth_failure(&hub, e))?;
        Ok(RegistrationBearer(token.to_string()))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminBearer {
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let hub = hub(parts)?;
        let token = bearer(parts).map_err(|e| auth_failure(&hub, e))?;
        if hub.is_admin(token) {
            Ok(AdminBearer)
        } else {
            Err(auth_failure(
                &hub,
                HubError::Unauthorized("invalid admin key".into()),
            ))
        }
    }
}
