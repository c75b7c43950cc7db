//! Poll decision tracking for the relay.
//!
//! The tracker remembers what was last delivered downstream and decides, for
//! each fetched configuration, whether to push it. Versions are authoritative:
//! a higher version is always a change, a lower one is a stale read. An equal
//! version with different settings was updated in place at the hub.
//!
//! Unchanged polls are counted; once the count exceeds the heartbeat
//! threshold the configuration is pushed anyway, to repair a leaf that
//! missed or lost an earlier push.

use std::time::Duration;
use sync_types::{Configuration, Version};

/// Unchanged polls tolerated before a forced repush.
pub const DEFAULT_HEARTBEAT_THRESHOLD: u32 = 3;

/// Why a configuration is being pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushReason {
    /// Nothing has been delivered yet.
    Initial,
    /// The hub has a newer version.
    Changed,
    /// Same version, different target or interval.
    UpdatedInPlace,
    /// Forced repush of an unchanged configuration.
    Heartbeat,
}

impl PushReason {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PushReason::Initial => "initial",
            PushReason::Changed => "changed",
            PushReason::UpdatedInPlace => "updated_in_place",
            PushReason::Heartbeat => "heartbeat",
        }
    }
}

/// Outcome of observing one fetched configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Push the fetched configuration.
    Push {
        /// Why.
        reason: PushReason,
    },
    /// Nothing to do this tick.
    Unchanged {
        /// Consecutive unchanged polls, including this one.
        unchanged_polls: u32,
    },
    /// The hub returned an older version than the one delivered.
    Stale {
        /// Version the hub returned.
        fetched: Version,
        /// Version last delivered.
        applied: Version,
    },
}

/// Relay-side delivery state.
#[derive(Debug, Clone)]
pub struct PollTracker {
    last_applied: Option<Configuration>,
    last_seen: Version,
    unchanged_polls: u32,
    heartbeat_threshold: u32,
    current_interval: Duration,
    failed_pushes: u64,
}

impl PollTracker {
    /// Create a tracker that has delivered nothing.
    pub fn new(heartbeat_threshold: u32, initial_interval: Duration) -> Self {
        Self {
            last_applied: None,
            last_seen: Version::zero(),
            unchanged_polls: 0,
            heartbeat_threshold,
            current_interval: initial_interval,
            failed_pushes: 0,
        }
    }

    /// Resume from a persisted snapshot.
    ///
    /// The snapshot only proves what was fetched, not what the leaf holds,
    /// so the next observation still pushes.
    pub fn with_last_seen(mut self, version: Version) -> Self {
        self.last_seen = version;
        self
    }

    /// Decide what to do with a freshly fetched configuration.
    pub fn observe(&mut self, fetched: &Configuration) -> PollDecision {
        let Some(applied) = &self.last_applied else {
            return PollDecision::Push {
                reason: PushReason::Initial,
            };
        };

        if fetched.version > applied.version {
            return PollDecision::Push {
                reason: PushReason::Changed,
            };
        }
        if fetched.version < applied.version {
            return PollDecision::Stale {
                fetched: fetched.version,
                applied: applied.version,
            };
        }
        if !fetched.same_settings(applied) {
            return PollDecision::Push {
                reason: PushReason::UpdatedInPlace,
            };
        }

        self.unchanged_polls = self.unchanged_polls.saturating_add(1);
        if self.unchanged_polls > self.heartbeat_threshold {
            PollDecision::Push {
                reason: PushReason::Heartbeat,
            }
        } else {
            PollDecision::Unchanged {
                unchanged_polls: self.unchanged_polls,
            }
        }
    }

    /// Note a successful fetch. Returns true when the snapshot should be
    /// rewritten (first fetch, or a version newer than any seen).
    pub fn note_fetched(&mut self, fetched: &Configuration) -> bool {
        if self.last_seen == Version::zero() || fetched.version > self.last_seen {
            self.last_seen = fetched.version;
            true
        } else {
            false
        }
    }

    /// Record a delivered configuration.
    ///
    /// Returns the new poll interval when it differs from the current one.
    pub fn record_push_success(&mut self, pushed: Configuration) -> Option<Duration> {
        self.unchanged_polls = 0;
        let interval = pushed.interval();
        self.last_applied = Some(pushed);
        if interval != self.current_interval {
            self.current_interval = interval;
            Some(interval)
        } else {
            None
        }
    }

    /// Record a failed delivery. Applied state is left untouched so the
    /// next tick decides again from the same baseline.
    pub fn record_push_failure(&mut self) {
        self.failed_pushes = self.failed_pushes.saturating_add(1);
    }

    /// Override the poll interval, e.g. from the first fetched configuration.
    ///
    /// Returns the new interval when it changed.
    pub fn set_interval(&mut self, interval: Duration) -> Option<Duration> {
        if interval != self.current_interval {
            self.current_interval = interval;
            Some(interval)
        } else {
            None
        }
    }

    /// The configuration last delivered downstream.
    pub fn last_applied(&self) -> Option<&Configuration> {
        self.last_applied.as_ref()
    }

    /// Highest version fetched so far.
    pub fn last_seen(&self) -> Version {
        self.last_seen
    }

    /// Current poll interval.
    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    /// Consecutive unchanged polls.
    pub fn unchanged_polls(&self) -> u32 {
        self.unchanged_polls
    }

    /// Total failed pushes.
    pub fn failed_pushes(&self) -> u64 {
        self.failed_pushes
    }
}
