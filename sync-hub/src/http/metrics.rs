//! Prometheus metrics endpoint.

use crate::server::Hub;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(hub): Extension<Arc<Hub>>) -> impl IntoResponse {
    let m = hub.metrics();

    // Counters
    let fetches = m.config_fetches_total.load(Ordering::Relaxed);
    let registrations = m.registrations_total.load(Ordering::Relaxed);
    let created = m.configs_created_total.load(Ordering::Relaxed);
    let updated = m.configs_updated_total.load(Ordering::Relaxed);
    let auth_failures = m.auth_failures_total.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits_total.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    // Gauges (best effort)
    let relays = hub.registry().relay_count().await.unwrap_or(0);
    let revisions = hub.store().revision_count().await.unwrap_or(0);
    let latest_version = hub
        .store()
        .get_latest()
        .await
        .map(|c| c.version.value())
        .unwrap_or(0);
    let limiter_keys = hub.rate_limits().relay_keys_count();

    let body = format!(
        r#"# HELP confsync_hub_info Server information
# TYPE confsync_hub_info gauge
confsync_hub_info{{version="{version}"}} 1

# HELP confsync_hub_config_version Version of the current configuration
# TYPE confsync_hub_config_version gauge
confsync_hub_config_version {latest_version}

# HELP confsync_hub_config_revisions Stored configuration revisions
# TYPE confsync_hub_config_revisions gauge
confsync_hub_config_revisions {revisions}

# HELP confsync_hub_relays_registered Registered relay identities
# TYPE confsync_hub_relays_registered gauge
confsync_hub_relays_registered {relays}

# HELP confsync_hub_rate_limiter_keys Relays tracked by the rate limiter
# TYPE confsync_hub_rate_limiter_keys gauge
confsync_hub_rate_limiter_keys {limiter_keys}

# HELP confsync_hub_config_fetches_total Configuration fetches served to relays
# TYPE confsync_hub_config_fetches_total counter
confsync_hub_config_fetches_total {fetches}

# HELP confsync_hub_registrations_total Relays registered
# TYPE confsync_hub_registrations_total counter
confsync_hub_registrations_total {registrations}

# HELP confsync_hub_configs_created_total Configuration revisions created
# TYPE confsync_hub_configs_created_total counter
confsync_hub_configs_created_total {created}

# HELP confsync_hub_configs_updated_total In-place configuration updates
# TYPE confsync_hub_configs_updated_total counter
confsync_hub_configs_updated_total {updated}

# HELP confsync_hub_auth_failures_total Rejected credentials
# TYPE confsync_hub_auth_failures_total counter
confsync_hub_auth_failures_total {auth_failures}

# HELP confsync_hub_rate_limit_hits_total Total rate limit rejections
# TYPE confsync_hub_rate_limit_hits_total counter
confsync_hub_rate_limit_hits_total {rate_limits}

# HELP confsync_hub_errors_total Requests that failed with a server error
# TYPE confsync_hub_errors_total counter
confsync_hub_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
