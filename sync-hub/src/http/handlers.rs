//! Configuration and registration handlers.

use super::auth::{AdminBearer, RegistrationBearer, RelayIdentity};
use crate::error::{HubError, Result};
use crate::server::{Hub, HubMetrics};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use sync_types::{ApiResponse, Configuration, ConfigurationPatch, NewConfiguration};

type Envelope<T> = Json<ApiResponse<T>>;

/// Count server-side failures before they become responses.
fn tracked<T>(hub: &Hub, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.status().is_server_error() {
            HubMetrics::incr(&hub.metrics().errors_total);
        }
    }
    result
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| HubError::Validation(e.body_text()))
}

/// `GET /config/agent`: latest configuration for a registered relay.
pub async fn relay_config(
    Extension(hub): Extension<Arc<Hub>>,
    RelayIdentity(relay_id): RelayIdentity,
) -> Result<Envelope<Configuration>> {
    let result = match hub.registry().ensure_registered(&relay_id).await {
        Ok(()) => hub.store().get_latest().await,
        Err(e) => Err(e),
    };
    let config = tracked(&hub, result)?;

    HubMetrics::incr(&hub.metrics().config_fetches_total);
    tracing::debug!(relay = %relay_id, version = %config.version, "Served configuration");
    Ok(Json(ApiResponse::success(config)))
}

/// `POST /agent/register`: exchange a registration token for an identity.
pub async fn register_relay(
    Extension(hub): Extension<Arc<Hub>>,
    RegistrationBearer(token): RegistrationBearer,
) -> Result<Envelope<String>> {
    let result = hub.registry().register(&token).await;
    if matches!(result, Err(HubError::Unauthorized(_))) {
        HubMetrics::incr(&hub.metrics().auth_failures_total);
    }
    let (_, credential) = tracked(&hub, result)?;

    HubMetrics::incr(&hub.metrics().registrations_total);
    Ok(Json(ApiResponse::success(credential)))
}

/// `GET /config/admin`: latest configuration.
pub async fn admin_latest(
    Extension(hub): Extension<Arc<Hub>>,
    _admin: AdminBearer,
) -> Result<Envelope<Configuration>> {
    let config = tracked(&hub, hub.store().get_latest().await)?;
    Ok(Json(ApiResponse::success(config)))
}

/// `POST /config/admin`: create a new revision.
pub async fn admin_create(
    Extension(hub): Extension<Arc<Hub>>,
    _admin: AdminBearer,
    payload: std::result::Result<Json<NewConfiguration>, JsonRejection>,
) -> Result<(StatusCode, Envelope<Configuration>)> {
    let request = body(payload)?;
    let config = tracked(&hub, hub.store().create(request).await)?;

    HubMetrics::incr(&hub.metrics().configs_created_total);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(config))))
}

/// `PUT /config/admin`: update the current revision in place.
pub async fn admin_update(
    Extension(hub): Extension<Arc<Hub>>,
    _admin: AdminBearer,
    payload: std::result::Result<Json<ConfigurationPatch>, JsonRejection>,
) -> Result<Envelope<Configuration>> {
    let patch = body(payload)?;
    let config = tracked(&hub, hub.store().update(patch).await)?;

    HubMetrics::incr(&hub.metrics().configs_updated_total);
    Ok(Json(ApiResponse::success(config)))
}

/// `GET /agent/admin`: a fresh registration token.
pub async fn admin_registration_token(
    Extension(hub): Extension<Arc<Hub>>,
    _admin: AdminBearer,
) -> Result<Envelope<String>> {
    let token = tracked(&hub, hub.registry().registration_token().await)?;
    Ok(Json(ApiResponse::success(token)))
}
