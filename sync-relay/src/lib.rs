//! # sync-relay
//!
//! Relay sync engine for confsync.
//!
//! The relay sits between the hub and one leaf:
//! - Registers itself with the hub on first start and stores the credential
//! - Waits for the hub to hold a configuration, then pushes it to the leaf
//! - Polls the hub on the configured interval and pushes changes
//! - Repushes an unchanged configuration after a few quiet polls
//!
//! ## Example
//!
//! ```ignore
//! use sync_relay::{EngineOptions, HttpHub, HttpLeaf, LocalCache, SyncEngine};
//!
//! let hub = HttpHub::new(&config.hub.url, config.hub.fetch_timeout())?;
//! let leaf = HttpLeaf::new(&config.leaf.url, &config.leaf.key, config.leaf.push_timeout())?;
//! let engine = SyncEngine::new(hub, leaf, LocalCache::new(&config.sync.state_dir),
//!     EngineOptions::from_config(&config));
//! engine.run(cancel).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod snapshot;
pub mod transport;

pub use config::Config;
pub use engine::{EngineError, EngineEvent, EngineOptions, RelayMetrics, SyncEngine};
pub use snapshot::{LocalCache, SnapshotError};
pub use transport::{HttpHub, HttpLeaf, HubApi, LeafApi, MockHub, MockLeaf, TransportError};
