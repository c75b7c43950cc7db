//! Upstream and downstream transports for the relay.
//!
//! The engine talks to the hub through [`HubApi`] and to the leaf through
//! [`LeafApi`]. [`http`] carries both over HTTP; [`mock`] records calls and
//! replays canned answers for tests.
//!
//! # Example
//!
//! ```ignore
//! let hub = HttpHub::new("http://127.0.0.1:8080", Duration::from_secs(30))?;
//! let credential = hub.register(&registration_token).await?;
//! let config = hub.fetch_config(&credential).await?;
//! ```

pub mod http;
mod mock;

pub use http::{HttpHub, HttpLeaf};
pub use mock::{MockHub, MockLeaf};

use async_trait::async_trait;
use sync_types::{Configuration, ErrorKind, PushPayload};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No response within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The peer could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer answered with a non-2xx status.
    #[error("rejected with {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error class derived from the status and envelope.
        kind: ErrorKind,
        /// Message from the envelope, or the raw body.
        message: String,
    },

    /// A 2xx response whose body could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Error class, used by the engine to decide whether to retry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => ErrorKind::Transient,
            Self::Rejected { kind, .. } => *kind,
            Self::Malformed(_) => ErrorKind::Internal,
        }
    }

    /// Whether the hub no longer knows the relay behind the credential.
    ///
    /// Shares `NotFound` with "no configuration yet"; the envelope message
    /// names the missing resource.
    pub fn is_unknown_relay(&self) -> bool {
        matches!(
            self,
            Self::Rejected { kind: ErrorKind::NotFound, message, .. }
                if message.strip_suffix(" not found") == Some("relay")
        )
    }

    /// Build a rejection from a non-2xx status and an optional envelope code.
    ///
    /// Server-side failures and throttling are always transient, whatever
    /// code the body carries.
    pub fn rejected(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        let kind = match (status, code) {
            (429, _) | (500..=599, _) => ErrorKind::Transient,
            (_, Some(code)) => ErrorKind::from_code(code),
            (401 | 403, None) => ErrorKind::Unauthorized,
            (404, None) => ErrorKind::NotFound,
            (400 | 422, None) => ErrorKind::ValidationFailed,
            (_, None) => ErrorKind::Transient,
        };
        Self::Rejected {
            status,
            kind,
            message: message.into(),
        }
    }
}

/// Requests the relay makes against the hub.
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Exchange a registration token for a durable credential.
    async fn register(&self, registration_token: &str) -> Result<String, TransportError>;

    /// Fetch the latest configuration using the relay's credential.
    async fn fetch_config(&self, credential: &str) -> Result<Configuration, TransportError>;
}

/// Requests the relay makes against the leaf.
#[async_trait]
pub trait LeafApi: Send + Sync {
    /// Push a configuration to the leaf.
    async fn push_config(&self, payload: &PushPayload) -> Result<(), TransportError>;
}
