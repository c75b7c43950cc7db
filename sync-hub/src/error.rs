//! Error types for sync-hub.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use sync_types::{ApiResponse, ErrorKind, SyncError};

/// Main error type for sync-hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Resource missing.
    #[error("{resource} not found")]
    NotFound {
        /// What was missing.
        resource: &'static str,
    },

    /// Caller failed authentication.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request body rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {reason}")]
    RateLimited {
        /// Reason for rate limiting.
        reason: String,
    },

    /// Token hashing or signing failed.
    #[error("token error: {0}")]
    Token(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Category used on the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::NotFound { .. } => ErrorKind::NotFound,
            HubError::Unauthorized(_) => ErrorKind::Unauthorized,
            HubError::Validation(_) => ErrorKind::ValidationFailed,
            HubError::RateLimited { .. } => ErrorKind::Transient,
            HubError::Config(_) | HubError::Storage(_) | HubError::Token(_) | HubError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP status for this error. Rate limiting is the one case that
    /// departs from the kind's default status.
    pub fn status(&self) -> StatusCode {
        if matches!(self, HubError::RateLimited { .. }) {
            return StatusCode::TOO_MANY_REQUESTS;
        }
        StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn public_message(&self) -> String {
        match self {
            HubError::NotFound { resource } => format!("{resource} not found"),
            HubError::Unauthorized(msg) | HubError::Validation(msg) => msg.clone(),
            HubError::RateLimited { reason } => reason.clone(),
            // Internal details stay in the logs
            _ => "internal error".to_string(),
        }
    }
}

impl From<SyncError> for HubError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotFound { .. } => HubError::NotFound { resource: "config" },
            SyncError::Unauthorized(m) => HubError::Unauthorized(m),
            SyncError::ValidationFailed(m) => HubError::Validation(m),
            SyncError::Transient(m) => HubError::RateLimited { reason: m },
            SyncError::Internal(m) => HubError::Token(m),
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body: ApiResponse<()> = ApiResponse::failure(self.kind(), self.public_message());
        (status, Json(body)).into_response()
    }
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Result type alias for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
