//! Relay lifecycle state machine.
//!
//! This module provides a pure, side-effect-free state machine for the relay
//! engine's lifecycle. It takes events as input and produces a new phase plus
//! a list of actions to execute.
//!
//! The actual I/O (registering, fetching, pushing) is performed by
//! sync-relay, not by this module.

use sync_types::ErrorKind;

/// Relay lifecycle phase - NO I/O, just transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No credential loaded yet.
    Unregistered,
    /// Self-registration with the hub in progress.
    Registering,
    /// Waiting for the first successful fetch.
    InitialSync {
        /// Failed fetch attempts so far.
        attempt: u32,
    },
    /// Steady-state polling.
    Polling,
    /// Terminal.
    ShuttingDown,
}

impl Phase {
    /// Create a new machine in the Unregistered phase.
    pub fn new() -> Self {
        Self::Unregistered
    }

    /// Process an event and return the new phase plus actions to execute.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Shutdown wins from anywhere
            (Self::ShuttingDown, _) => (Self::ShuttingDown, vec![]),
            (_, Event::ShutdownRequested) => (Self::ShuttingDown, vec![Action::Stop]),

            // From Unregistered
            (Self::Unregistered, Event::CredentialLoaded) => {
                (Self::InitialSync { attempt: 0 }, vec![Action::Fetch])
            }
            (Self::Unregistered, Event::CredentialMissing) => {
                (Self::Registering, vec![Action::Register])
            }

            // From Registering
            (Self::Registering, Event::Registered) => (
                Self::InitialSync { attempt: 0 },
                vec![Action::PersistCredential, Action::Fetch],
            ),
            (Self::Registering, Event::RegistrationFailed { error }) => (
                Self::ShuttingDown,
                vec![Action::Abort {
                    reason: format!("registration failed: {error}"),
                }],
            ),

            // From InitialSync
            (Self::InitialSync { .. }, Event::Fetched) => (
                Self::Polling,
                vec![Action::PushCurrent, Action::StartPolling],
            ),
            (Self::InitialSync { attempt }, Event::FetchFailed { kind, error }) => {
                if initial_fetch_is_fatal(kind) {
                    (
                        Self::ShuttingDown,
                        vec![Action::Abort {
                            reason: format!("initial fetch failed: {error}"),
                        }],
                    )
                } else {
                    let next_attempt = attempt.saturating_add(1);
                    (
                        Self::InitialSync {
                            attempt: next_attempt,
                        },
                        vec![Action::ScheduleRetry {
                            attempt: next_attempt,
                        }],
                    )
                }
            }
            (Self::InitialSync { attempt }, Event::RetryElapsed) => {
                (Self::InitialSync { attempt }, vec![Action::Fetch])
            }

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, vec![]),
        }
    }

    /// Whether the engine has reached steady-state polling.
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling)
    }

    /// Whether the engine is done.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::new()
    }
}

/// NotFound and transient failures keep the relay waiting; everything else
/// means the relay is misconfigured.
fn initial_fetch_is_fatal(kind: ErrorKind) -> bool {
    match kind {
        ErrorKind::NotFound | ErrorKind::Transient => false,
        ErrorKind::Unauthorized | ErrorKind::ValidationFailed | ErrorKind::Internal => true,
    }
}

/// Events that can occur in the relay lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A credential was found in the local durable cache.
    CredentialLoaded,
    /// No credential on disk.
    CredentialMissing,
    /// The hub issued a credential.
    Registered,
    /// Registration was refused or unreachable.
    RegistrationFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A fetch returned a configuration.
    Fetched,
    /// A fetch failed.
    FetchFailed {
        /// Category of the failure.
        kind: ErrorKind,
        /// Error message describing the failure.
        error: String,
    },
    /// The initial-sync backoff elapsed.
    RetryElapsed,
    /// Cancellation was signalled.
    ShutdownRequested,
}

/// Actions to be executed by the relay engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Call the hub's registration endpoint.
    Register,
    /// Write the issued credential to the local durable cache.
    PersistCredential,
    /// Fetch the latest configuration.
    Fetch,
    /// Sleep for the initial-sync backoff, then retry.
    ScheduleRetry {
        /// Which attempt just failed.
        attempt: u32,
    },
    /// Push the fetched configuration to the leaf.
    PushCurrent,
    /// Enter the polling loop.
    StartPolling,
    /// Stop with an error.
    Abort {
        /// Why the engine cannot continue.
        reason: String,
    },
    /// Stop cleanly.
    Stop,
}
