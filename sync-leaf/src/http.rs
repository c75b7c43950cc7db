//! HTTP endpoints for sync-leaf.
//!
//! Relays push to `POST /config`; everything else is read-only.

use crate::config::Config;
use crate::error::{LeafError, Result};
use crate::holder::ConfigHolder;
use crate::task::{TaskOutcome, TaskRunner};
use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use sync_core::SharedSecret;
use sync_types::{ApiResponse, PushPayload};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Shared state behind every handler.
#[derive(Debug)]
pub struct LeafState {
    holder: Arc<ConfigHolder>,
    runner: TaskRunner,
    push_key: SharedSecret,
}

impl LeafState {
    /// Build state from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let holder = Arc::new(ConfigHolder::new());
        let runner = TaskRunner::new(Arc::clone(&holder), &config.task)?;
        Ok(Self {
            holder,
            runner,
            push_key: SharedSecret::from(config.security.push_key.as_str()),
        })
    }

    /// The configuration holder.
    pub fn holder(&self) -> &Arc<ConfigHolder> {
        &self.holder
    }
}

/// Proof that the caller holds the push key.
#[derive(Debug, Clone, Copy)]
pub struct PushBearer;

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PushBearer {
    type Rejection = LeafError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<Arc<LeafState>>()
            .cloned()
            .ok_or_else(|| LeafError::Task("leaf extension missing".into()))?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::trim)
            .unwrap_or_default();

        if state.push_key.matches(token.as_bytes()) {
            Ok(PushBearer)
        } else {
            Err(LeafError::Unauthorized("invalid push key".into()))
        }
    }
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Version of the held configuration, if any.
    pub config_version: Option<u64>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

type Envelope<T> = Json<ApiResponse<T>>;

/// `POST /config`: accept a pushed configuration.
async fn push_config(
    Extension(state): Extension<Arc<LeafState>>,
    _auth: PushBearer,
    payload: std::result::Result<Json<PushPayload>, JsonRejection>,
) -> Result<Envelope<PushPayload>> {
    let Json(payload) = payload.map_err(|e| LeafError::Validation(e.body_text()))?;
    payload.validate()?;

    state.holder.apply(payload.clone()).await;
    Ok(Json(ApiResponse::success(payload)))
}

/// `GET /config`: the held configuration.
async fn current_config(
    Extension(state): Extension<Arc<LeafState>>,
) -> Result<Envelope<PushPayload>> {
    Ok(Json(ApiResponse::success(state.holder.read().await?)))
}

/// `GET /hit`: run one task against the target.
async fn hit(Extension(state): Extension<Arc<LeafState>>) -> Result<Envelope<TaskOutcome>> {
    Ok(Json(ApiResponse::success(state.runner.execute().await?)))
}

async fn health(Extension(state): Extension<Arc<LeafState>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_version: state.holder.version().await.map(|v| v.value()),
        uptime_seconds: uptime,
    })
}

/// Build the HTTP router with all endpoints.
pub fn build_router(state: Arc<LeafState>) -> Router {
    Router::new()
        .route("/config", get(current_config).post(push_config))
        .route("/hit", get(hit))
        .route("/health", get(health))
        .layer(Extension(state))
}

/// Serve the leaf on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: Arc<LeafState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    START_TIME.get_or_init(Instant::now);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
