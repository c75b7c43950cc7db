//! # sync-hub
//!
//! Version-authoritative configuration hub for confsync.
//!
//! This crate implements the hub that:
//! - Holds the single current configuration, versioned by the hub alone
//! - Registers relays and issues their signed identity tokens
//! - Serves the latest configuration to authenticated relays
//! - Exposes an admin surface guarded by a static bearer key
//!
//! ## Architecture
//!
//! ```text
//!  operator ──► /config/admin ──┐
//!                               ▼
//!        ┌───────────────────────────────────┐
//!        │             sync-hub              │
//!        │  VersionStore ─► MemoryCache      │
//!        │       │                           │
//!        │       ▼                           │
//!        │  SQLite (configurations, relays)  │
//!        └───────────────────────────────────┘
//!                               ▲
//!  relay ───► /config/agent ────┘   (pull, bearer identity token)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod limits;
pub mod registry;
pub mod server;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::HubError;
pub use server::Hub;
