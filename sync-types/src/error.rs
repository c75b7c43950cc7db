//! Error taxonomy for confsync.

use thiserror::Error;

/// Machine-readable error category shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No configuration or identity exists yet.
    NotFound,
    /// Signature or shared-secret mismatch.
    Unauthorized,
    /// Interval below the floor, missing required field.
    ValidationFailed,
    /// Network timeout, non-2xx from a dependency, rate limiting.
    Transient,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// Wire code carried in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::Unauthorized => "ERR_UNAUTHORIZED",
            ErrorKind::ValidationFailed => "ERR_VALIDATION",
            ErrorKind::Transient => "ERR_TRANSIENT",
            ErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Parse a wire code. Unknown codes are treated as internal.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ERR_NOT_FOUND" => ErrorKind::NotFound,
            "ERR_UNAUTHORIZED" => ErrorKind::Unauthorized,
            "ERR_VALIDATION" => ErrorKind::ValidationFailed,
            "ERR_TRANSIENT" => ErrorKind::Transient,
            _ => ErrorKind::Internal,
        }
    }

    /// HTTP status used when this kind is returned from an API.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Unauthorized => 401,
            ErrorKind::ValidationFailed => 400,
            ErrorKind::Transient => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether the caller should simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Errors that can occur in confsync operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Resource does not exist (yet).
    #[error("{resource} not found")]
    NotFound {
        /// What was missing ("config", "relay", ...).
        resource: String,
    },

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Input rejected.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Temporary failure, safe to retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Shorthand for a NotFound error.
    pub fn not_found(resource: &str) -> Self {
        SyncError::NotFound {
            resource: resource.to_string(),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Unauthorized(_) => ErrorKind::Unauthorized,
            SyncError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            SyncError::Transient(_) => ErrorKind::Transient,
            SyncError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from a wire code and message.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match ErrorKind::from_code(code) {
            ErrorKind::NotFound => SyncError::NotFound {
                resource: message
                    .strip_suffix(" not found")
                    .unwrap_or(message)
                    .to_string(),
            },
            ErrorKind::Unauthorized => SyncError::Unauthorized(message.to_string()),
            ErrorKind::ValidationFailed => SyncError::ValidationFailed(message.to_string()),
            ErrorKind::Transient => SyncError::Transient(message.to_string()),
            ErrorKind::Internal => SyncError::Internal(message.to_string()),
        }
    }
}
