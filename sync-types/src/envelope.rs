//! Uniform response envelope used by every HTTP surface.

use crate::error::{ErrorKind, SyncError};
use serde::{Deserialize, Serialize};

/// Outcome marker of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// `data` is present.
    Success,
    /// `error` is present.
    Error,
}

/// Machine-readable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// One of the `ERR_*` codes.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

/// `{"status": "success", "data": ...}` or
/// `{"status": "error", "error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    /// Success or error.
    pub status: Status,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Detail on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    /// Wrap a successful payload.
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }

    /// Build an error envelope.
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: None,
            error: Some(ErrorBody {
                code: kind.code().to_string(),
                message: message.into(),
            }),
        }
    }

    /// Unwrap the envelope into the payload or the carried error.
    pub fn into_result(self) -> Result<T, SyncError> {
        match (self.status, self.data, self.error) {
            (Status::Success, Some(data), _) => Ok(data),
            (Status::Success, None, _) => {
                Err(SyncError::Internal("success envelope without data".into()))
            }
            (Status::Error, _, Some(err)) => Err(SyncError::from_wire(&err.code, &err.message)),
            (Status::Error, _, None) => {
                Err(SyncError::Internal("error envelope without detail".into()))
            }
        }
    }
}

impl<T> From<&SyncError> for ApiResponse<T> {
    fn from(err: &SyncError) -> Self {
        let message = match err {
            SyncError::NotFound { .. } => err.to_string(),
            SyncError::Unauthorized(m)
            | SyncError::ValidationFailed(m)
            | SyncError::Transient(m)
            | SyncError::Internal(m) => m.clone(),
        };
        Self::failure(err.kind(), message)
    }
}
