//! # sync-leaf
//!
//! Terminal configuration holder for confsync.
//!
//! A leaf accepts configuration pushes from its relay, holds the latest one
//! it was given, and runs tasks (`GET target`) against the configured
//! target on request.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod holder;
pub mod http;
pub mod task;

pub use config::Config;
pub use error::LeafError;
pub use holder::{Applied, ConfigHolder};
pub use http::LeafState;
pub use task::{TaskOutcome, TaskRunner};
