//! # sync-types
//!
//! Wire format types shared by the confsync hub, relay, and leaf.
//!
//! This crate provides the foundational types used across all confsync crates:
//! - [`ConfigId`], [`RelayId`], [`Version`] - Identity and ordering types
//! - [`Configuration`], [`PushPayload`] - The distributed unit of truth
//! - [`ApiResponse`] - Uniform response envelope
//! - [`SyncError`], [`ErrorKind`] - Error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod envelope;
mod error;
mod ids;

pub use config::{
    validate_interval, validate_target, Configuration, ConfigurationPatch, NewConfiguration,
    PushPayload, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
pub use envelope::{ApiResponse, ErrorBody, Status};
pub use error::{ErrorKind, SyncError};
pub use ids::{ConfigId, RelayId, Version};
