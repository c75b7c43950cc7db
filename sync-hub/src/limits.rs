//! Rate limiting for sync-hub.
//!
//! Relay-facing routes are limited per relay identity and globally. Both use
//! the governor crate; the keyed limiter is backed by DashMap.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use sync_types::RelayId;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the hub.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits requests per relay identity.
    relay_limiter: Arc<KeyedLimiter<RelayId>>,

    /// Caps aggregate load even if each relay is within its own limit.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("relay_limiter", &"KeyedLimiter<RelayId>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// Zero values are clamped to one; [`crate::config::Config::validate`]
    /// rejects them before this point.
    pub fn new(config: &LimitsConfig) -> Self {
        let per_relay = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let global = NonZeroU32::new(config.global_requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            relay_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_relay))),
            global_limiter: Arc::new(RateLimiter::direct(Quota::per_second(global))),
        }
    }

    /// Check if a request from this relay is allowed.
    pub fn check_relay(&self, relay_id: &RelayId) -> Result<(), RateLimitError> {
        self.relay_limiter
            .check_key(relay_id)
            .map_err(|_| RateLimitError::RelayLimitExceeded)
    }

    /// Check if the global request rate is within limits.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }

    /// Get the number of tracked relay keys (for metrics).
    pub fn relay_keys_count(&self) -> usize {
        self.relay_limiter.len()
    }

    /// Evict entries for relays that have gone quiet.
    pub fn shrink(&self) {
        self.relay_limiter.retain_recent();
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many requests from this relay.
    #[error("relay rate limit exceeded")]
    RelayLimitExceeded,
    /// Global request rate exceeded across all relays.
    #[error("global rate limit exceeded")]
    GlobalLimitExceeded,
}
