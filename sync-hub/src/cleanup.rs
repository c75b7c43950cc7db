//! Background cleanup task for rate limiter state.
//!
//! Relays that stop polling leave entries in the keyed limiter; this task
//! evicts them periodically.

use crate::config::CleanupConfig;
use crate::server::Hub;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Spawn a background cleanup task.
///
/// The task exits when `cancel` fires or immediately if disabled.
pub fn spawn_cleanup_task(
    hub: Arc<Hub>,
    config: CleanupConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!(interval_secs, "Cleanup task started");

        let mut timer = interval(Duration::from_secs(interval_secs));
        timer.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Cleanup task stopping");
                    return;
                }
                _ = timer.tick() => {
                    let before = hub.rate_limits().relay_keys_count();
                    hub.rate_limits().shrink();
                    let after = hub.rate_limits().relay_keys_count();
                    tracing::debug!(before, after, "Cleanup: shrank relay limiter");
                }
            }
        }
    })
}
