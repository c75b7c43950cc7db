//! Error types for sync-leaf.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sync_types::{ApiResponse, ErrorKind, SyncError};

/// Main error type for sync-leaf operations.
#[derive(Debug, thiserror::Error)]
pub enum LeafError {
    /// No configuration has been pushed yet.
    #[error("configuration not set")]
    NotSet,

    /// Push presented the wrong key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Pushed payload rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request against the target failed.
    #[error("task request failed: {0}")]
    Task(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LeafError {
    /// Category used on the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeafError::NotSet => ErrorKind::NotFound,
            LeafError::Unauthorized(_) => ErrorKind::Unauthorized,
            LeafError::Validation(_) => ErrorKind::ValidationFailed,
            LeafError::Task(_) => ErrorKind::Transient,
            LeafError::Config(_) | LeafError::Io(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn public_message(&self) -> String {
        match self {
            LeafError::NotSet => self.to_string(),
            LeafError::Unauthorized(msg) | LeafError::Validation(msg) | LeafError::Task(msg) => {
                msg.clone()
            }
            _ => "internal error".to_string(),
        }
    }
}

impl From<SyncError> for LeafError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotFound { .. } => LeafError::NotSet,
            SyncError::Unauthorized(m) => LeafError::Unauthorized(m),
            SyncError::ValidationFailed(m) => LeafError::Validation(m),
            SyncError::Transient(m) | SyncError::Internal(m) => LeafError::Task(m),
        }
    }
}

impl IntoResponse for LeafError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let body: ApiResponse<()> = ApiResponse::failure(self.kind(), self.public_message());
        (status, Json(body)).into_response()
    }
}

/// Result type alias for leaf operations.
pub type Result<T> = std::result::Result<T, LeafError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_kinds() {
        assert_eq!(LeafError::NotSet.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            LeafError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            LeafError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LeafError::Task("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn validation_from_sync_error() {
        let err: LeafError = SyncError::ValidationFailed("interval too small".into()).into();
        assert!(matches!(err, LeafError::Validation(_)));
        assert_eq!(err.public_message(), "interval too small");
    }

    #[test]
    fn io_details_are_hidden() {
        let err = LeafError::Io(std::io::Error::other("disk on fire"));
        assert_eq!(err.public_message(), "internal error");
    }
}
