//! The relay sync engine.
//!
//! Startup walks the [`Phase`] machine from sync-core: load or obtain a
//! credential, wait for the hub to have a configuration, push it to the
//! leaf. After that the engine polls the hub on the configured interval
//! and lets the [`PollTracker`] decide what reaches the leaf.
//!
//! All mutable relay state sits behind one async mutex. The lock is never
//! held across a network call. Interval changes travel to the poll loop as
//! [`EngineEvent`]s; only the loop touches the timer.

use crate::config::Config;
use crate::snapshot::{LocalCache, SnapshotError};
use crate::transport::{HubApi, LeafApi};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use sync_core::{Action, Event, Phase, PollDecision, PollTracker, PushReason};
use sync_types::{Configuration, ErrorKind, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Engine errors. All of them end [`SyncEngine::run`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The local durable cache could not be read or written.
    #[error("local state: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Startup cannot continue (registration refused, bad credential).
    #[error("{0}")]
    Fatal(String),

    /// `run` was already called on this engine.
    #[error("engine is already running")]
    AlreadyRunning,
}

/// Messages delivered to the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pushed configuration carried a new interval.
    IntervalChanged(Duration),
}

/// Engine tuning.
#[derive(Clone)]
pub struct EngineOptions {
    /// Token exchanged for a credential when none is stored.
    pub registration_token: String,
    /// Delay between initial fetch attempts.
    pub retry_backoff: Duration,
    /// Unchanged polls before a forced repush.
    pub heartbeat_threshold: u32,
}

impl EngineOptions {
    /// Options taken from the relay configuration file.
    pub fn from_config(config: &Config) -> Self {
        Self {
            registration_token: config.hub.registration_token.clone(),
            retry_backoff: config.sync.retry_backoff(),
            heartbeat_threshold: config.sync.heartbeat_threshold,
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("registration_token", &"[REDACTED]")
            .field("retry_backoff", &self.retry_backoff)
            .field("heartbeat_threshold", &self.heartbeat_threshold)
            .finish()
    }
}

/// Counters, monotonic since startup.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Steady-state polls started.
    pub polls_total: AtomicU64,
    /// Fetches that failed, initial sync included.
    pub fetch_failures_total: AtomicU64,
    /// Pushes the leaf acknowledged.
    pub pushes_total: AtomicU64,
    /// Pushes that failed.
    pub push_failures_total: AtomicU64,
}

impl RelayMetrics {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

struct RelayState {
    credential: Option<String>,
    tracker: PollTracker,
}

/// Polls the hub and keeps the leaf current.
pub struct SyncEngine<H, L> {
    hub: H,
    leaf: L,
    cache: LocalCache,
    options: EngineOptions,
    state: Mutex<RelayState>,
    events: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    metrics: RelayMetrics,
}

fn default_interval() -> Duration {
    Duration::from_secs(MIN_INTERVAL_SECS)
}

fn ticker(period: Duration) -> Interval {
    let period = period.clamp(default_interval(), Duration::from_secs(MAX_INTERVAL_SECS));
    let now = Instant::now();
    let start = now.checked_add(period).unwrap_or(now);
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl<H: HubApi, L: LeafApi> SyncEngine<H, L> {
    /// Create an engine. Nothing happens until [`run`](Self::run).
    pub fn new(hub: H, leaf: L, cache: LocalCache, options: EngineOptions) -> Self {
        let (events, events_rx) = mpsc::unbounded_channel();
        let tracker = PollTracker::new(options.heartbeat_threshold, default_interval());
        Self {
            hub,
            leaf,
            cache,
            options,
            state: Mutex::new(RelayState {
                credential: None,
                tracker,
            }),
            events,
            events_rx: Mutex::new(Some(events_rx)),
            metrics: RelayMetrics::default(),
        }
    }

    /// Engine counters.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// The configuration the leaf last acknowledged.
    pub async fn last_applied(&self) -> Option<Configuration> {
        self.state.lock().await.tracker.last_applied().cloned()
    }

    /// Current poll interval.
    pub async fn current_interval(&self) -> Duration {
        self.state.lock().await.tracker.current_interval()
    }

    /// Run until `cancel` fires or startup fails.
    ///
    /// A poll already in flight when `cancel` fires is allowed to finish.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), EngineError> {
        let mut events = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or(EngineError::AlreadyRunning)?;

        self.restore_snapshot().await;

        let mut event = match self.cache.load_credential().await? {
            Some(credential) => {
                info!("Loaded stored credential");
                self.state.lock().await.credential = Some(credential);
                Event::CredentialLoaded
            }
            None => Event::CredentialMissing,
        };

        let mut phase = Phase::new();
        let mut fetched = None;
        loop {
            let (next, actions) = phase.on_event(event);
            phase = next;

            let mut next_event = None;
            for action in actions {
                match action {
                    Action::Register => next_event = Some(self.register().await),
                    Action::PersistCredential => self.persist_credential().await?,
                    Action::Fetch => {
                        next_event = Some(if cancel.is_cancelled() {
                            Event::ShutdownRequested
                        } else {
                            self.initial_fetch(&mut fetched).await
                        });
                    }
                    Action::ScheduleRetry { attempt } => {
                        let backoff = self.options.retry_backoff;
                        info!(attempt, retry_in_secs = backoff.as_secs(), "Waiting for hub configuration");
                        next_event = Some(tokio::select! {
                            _ = cancel.cancelled() => Event::ShutdownRequested,
                            _ = tokio::time::sleep(backoff) => Event::RetryElapsed,
                        });
                    }
                    Action::PushCurrent => {
                        if let Some(config) = fetched.take() {
                            self.process(config).await;
                        }
                    }
                    Action::StartPolling => return self.poll_loop(&mut events, &cancel).await,
                    Action::Abort { reason } => {
                        error!(%reason, "Relay cannot start");
                        return Err(EngineError::Fatal(reason));
                    }
                    Action::Stop => {
                        info!("Relay engine stopped");
                        return Ok(());
                    }
                }
            }

            event = next_event
                .ok_or_else(|| EngineError::Fatal(format!("no progress from {phase:?}")))?;
        }
    }

    /// Fetch once and act on the result. Used by the poll loop.
    ///
    /// Returns `None` when the fetch failed or no credential is held yet.
    pub async fn poll_once(&self) -> Option<PollDecision> {
        let Some(credential) = self.state.lock().await.credential.clone() else {
            warn!("Poll skipped: no credential");
            return None;
        };

        RelayMetrics::incr(&self.metrics.polls_total);
        match self.hub.fetch_config(&credential).await {
            Ok(config) => Some(self.process(config).await),
            Err(e) => {
                RelayMetrics::incr(&self.metrics.fetch_failures_total);
                if e.kind() == ErrorKind::Unauthorized {
                    error!(error = %e, "Hub rejected the relay credential");
                } else if e.is_unknown_relay() {
                    error!(error = %e, "Hub does not know this relay, remove the stored credential to re-register");
                } else {
                    warn!(error = %e, "Fetch failed, keeping current configuration");
                }
                None
            }
        }
    }

    async fn poll_loop(
        &self,
        events: &mut mpsc::UnboundedReceiver<EngineEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let mut period = self.current_interval().await;
        let mut timer = ticker(period);
        info!(interval_secs = period.as_secs(), "Polling started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Relay engine stopped");
                    return Ok(());
                }
                Some(event) = events.recv() => match event {
                    EngineEvent::IntervalChanged(new_period) if new_period != period => {
                        info!(
                            from_secs = period.as_secs(),
                            to_secs = new_period.as_secs(),
                            "Poll interval changed"
                        );
                        period = new_period;
                        timer = ticker(period);
                    }
                    EngineEvent::IntervalChanged(_) => {}
                },
                _ = timer.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    async fn restore_snapshot(&self) {
        match self.cache.load_config().await {
            Ok(Some(config)) => {
                info!(version = %config.version, "Restored configuration snapshot");
                let mut state = self.state.lock().await;
                state.tracker = PollTracker::new(self.options.heartbeat_threshold, config.interval())
                    .with_last_seen(config.version);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable configuration snapshot"),
        }
    }

    async fn register(&self) -> Event {
        let token = &self.options.registration_token;
        if token.is_empty() {
            return Event::RegistrationFailed {
                error: "no stored credential and no registration token configured".into(),
            };
        }

        match self.hub.register(token).await {
            Ok(credential) => {
                info!("Registered with hub");
                self.state.lock().await.credential = Some(credential);
                Event::Registered
            }
            Err(e) => Event::RegistrationFailed {
                error: e.to_string(),
            },
        }
    }

    async fn persist_credential(&self) -> Result<(), EngineError> {
        let credential = self.state.lock().await.credential.clone();
        if let Some(credential) = credential {
            self.cache.save_credential(&credential).await?;
            debug!(dir = %self.cache.dir().display(), "Credential stored");
        }
        Ok(())
    }

    async fn initial_fetch(&self, slot: &mut Option<Configuration>) -> Event {
        let Some(credential) = self.state.lock().await.credential.clone() else {
            return Event::FetchFailed {
                kind: ErrorKind::Unauthorized,
                error: "no credential".into(),
            };
        };

        match self.hub.fetch_config(&credential).await {
            Ok(config) => {
                self.state
                    .lock()
                    .await
                    .tracker
                    .set_interval(config.interval());
                *slot = Some(config);
                Event::Fetched
            }
            Err(e) => {
                RelayMetrics::incr(&self.metrics.fetch_failures_total);
                if e.is_unknown_relay() {
                    error!(error = %e, "Hub does not know this relay, remove the stored credential to re-register");
                } else if e.kind() == ErrorKind::NotFound {
                    debug!("Hub has no configuration yet");
                } else {
                    warn!(error = %e, "Initial fetch failed");
                }
                Event::FetchFailed {
                    kind: e.kind(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn process(&self, config: Configuration) -> PollDecision {
        let (decision, rewrite_snapshot) = {
            let mut state = self.state.lock().await;
            let rewrite = state.tracker.note_fetched(&config);
            (state.tracker.observe(&config), rewrite)
        };

        if rewrite_snapshot {
            if let Err(e) = self.cache.save_config(&config).await {
                warn!(error = %e, "Failed to write configuration snapshot");
            }
        }

        match decision {
            PollDecision::Push { reason } => self.deliver(config, reason).await,
            PollDecision::Unchanged { unchanged_polls } => {
                debug!(version = %config.version, unchanged_polls, "Configuration unchanged");
            }
            PollDecision::Stale { fetched, applied } => {
                warn!(%fetched, %applied, "Hub returned an older version, ignoring");
            }
        }
        decision
    }

    async fn deliver(&self, config: Configuration, reason: PushReason) {
        let payload = config.to_push();
        match self.leaf.push_config(&payload).await {
            Ok(()) => {
                RelayMetrics::incr(&self.metrics.pushes_total);
                let changed = self.state.lock().await.tracker.record_push_success(config);
                info!(
                    version = %payload.version,
                    reason = reason.as_str(),
                    "Pushed configuration to leaf"
                );
                if let Some(interval) = changed {
                    // The receiver lives as long as the engine.
                    let _ = self.events.send(EngineEvent::IntervalChanged(interval));
                }
            }
            Err(e) => {
                RelayMetrics::incr(&self.metrics.push_failures_total);
                self.state.lock().await.tracker.record_push_failure();
                warn!(
                    version = %payload.version,
                    reason = reason.as_str(),
                    error = %e,
                    "Push to leaf failed, will retry next poll"
                );
            }
        }
    }
}
