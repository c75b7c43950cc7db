//! # sync-core
//!
//! Pure logic for confsync (no I/O, instant tests).
//!
//! This crate implements the token protocol and the relay's decision
//! logic without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The actual I/O (HTTP, disk) is performed by
//! `sync-relay` and `sync-hub`, which interpret the decisions and actions
//! produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod identity;
pub mod registration;
pub mod state;
pub mod tracker;

pub use identity::{issue, verify, IdentityError, SharedSecret, Verification};
pub use registration::{issue_registration_token, verify_registration_token, RegistrationCost};
pub use state::{Action, Event, Phase};
pub use tracker::{PollDecision, PollTracker, PushReason, DEFAULT_HEARTBEAT_THRESHOLD};
