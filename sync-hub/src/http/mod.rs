//! HTTP endpoints for sync-hub.
//!
//! Relay-facing configuration and registration routes, the admin surface,
//! health checks, and metrics.

pub mod auth;
pub mod handlers;
pub mod health;
mod metrics;

use crate::server::Hub;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(hub: Arc<Hub>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/config/agent", get(handlers::relay_config))
        .route("/agent/register", post(handlers::register_relay))
        .route(
            "/config/admin",
            get(handlers::admin_latest)
                .post(handlers::admin_create)
                .put(handlers::admin_update),
        )
        .route("/agent/admin", get(handlers::admin_registration_token));

    if hub.config().server.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(hub))
}

/// Serve the hub on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<Hub>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    health::init_start_time();
    axum::serve(listener, build_router(hub))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::test_hub;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use sync_core::{issue, SharedSecret};
    use sync_types::RelayId;
    use tower::util::ServiceExt;

    fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        (status, json_body(response).await)
    }

    async fn registered(app: &Router) -> String {
        let (_, body) = send(app, request(Method::GET, "/agent/admin", Some("admin-key"), None)).await;
        let reg_token = body["data"].as_str().unwrap().to_string();
        let (status, body) = send(
            app,
            request(Method::POST, "/agent/register", Some(&reg_token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_router(test_hub().await);
        let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["latest_version"].is_null());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let app = build_router(test_hub().await);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE confsync_hub_config_fetches_total counter"));
        assert!(text.contains("confsync_hub_relays_registered 0"));
    }

    #[tokio::test]
    async fn admin_routes_need_admin_key() {
        let app = build_router(test_hub().await);
        let (status, body) = send(&app, request(Method::GET, "/config/admin", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"]["code"], "ERR_UNAUTHORIZED");

        let (status, _) = send(
            &app,
            request(Method::GET, "/config/admin", Some("wrong"), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_create_update_and_read() {
        let app = build_router(test_hub().await);

        let (status, body) = send(
            &app,
            request(Method::GET, "/config/admin", Some("admin-key"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "ERR_NOT_FOUND");

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/config/admin",
                Some("admin-key"),
                Some(serde_json::json!({"target": "https://example.com/a", "interval": 30})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["version"], 1);

        let (status, body) = send(
            &app,
            request(
                Method::PUT,
                "/config/admin",
                Some("admin-key"),
                Some(serde_json::json!({"interval": 60})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["version"], 1);
        assert_eq!(body["data"]["interval"], 60);
        assert_eq!(body["data"]["target"], "https://example.com/a");
    }

    #[tokio::test]
    async fn admin_create_validates() {
        let app = build_router(test_hub().await);
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/config/admin",
                Some("admin-key"),
                Some(serde_json::json!({"target": "https://example.com/a", "interval": 29})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "ERR_VALIDATION");

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/config/admin",
                Some("admin-key"),
                Some(serde_json::json!({"interval": 30})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "ERR_VALIDATION");
    }

    #[tokio::test]
    async fn relay_registers_and_fetches() {
        let app = build_router(test_hub().await);
        let credential = registered(&app).await;

        let (status, body) = send(
            &app,
            request(Method::GET, "/config/agent", Some(&credential), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "config not found");

        send(
            &app,
            request(
                Method::POST,
                "/config/admin",
                Some("admin-key"),
                Some(serde_json::json!({"target": "https://example.com/a", "interval": 30})),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            request(Method::GET, "/config/agent", Some(&credential), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["target"], "https://example.com/a");
    }

    #[tokio::test]
    async fn registration_rejects_raw_secret() {
        let app = build_router(test_hub().await);
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/agent/register",
                Some("registration-secret"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "ERR_UNAUTHORIZED");
    }

    #[tokio::test]
    async fn forged_identity_is_rejected() {
        let app = build_router(test_hub().await);
        let forged = issue(&RelayId::new().to_string(), &SharedSecret::from("guess")).unwrap();
        let (status, _) = send(
            &app,
            request(Method::GET, "/config/agent", Some(&forged), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unregistered_identity_is_not_found() {
        let app = build_router(test_hub().await);
        let stranger = issue(
            &RelayId::new().to_string(),
            &SharedSecret::from("identity-secret"),
        )
        .unwrap();
        let (status, body) = send(
            &app,
            request(Method::GET, "/config/agent", Some(&stranger), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "relay not found");
    }

    #[tokio::test]
    async fn relay_rate_limit_returns_429() {
        let storage = crate::storage::SqliteStorage::in_memory().await.unwrap();
        let mut config = crate::server::tests::test_config();
        config.limits.requests_per_minute = 2;
        let app = build_router(Arc::new(Hub::new(config, storage).unwrap()));
        let credential = registered(&app).await;

        for _ in 0..2 {
            let (status, _) = send(
                &app,
                request(Method::GET, "/config/agent", Some(&credential), None),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, body) = send(
            &app,
            request(Method::GET, "/config/agent", Some(&credential), None),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "ERR_TRANSIENT");
    }

    #[tokio::test]
    async fn metrics_can_be_disabled() {
        let storage = crate::storage::SqliteStorage::in_memory().await.unwrap();
        let mut config = crate::server::tests::test_config();
        config.server.metrics_enabled = false;
        let app = build_router(Arc::new(Hub::new(config, storage).unwrap()));
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
