//! Error types for the admin console.
//!
//! This module defines the `AdminError` enum which represents all possible
//! errors that can occur while talking to the backend, validating input, or
//! running console operations.

use thiserror::Error;

/// Broad failure classes surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No connection, timeout, backend unreachable.
    Network,
    /// The backend refused the operation.
    Rejected,
    /// Input was rejected before any request was dispatched.
    Validation,
    /// A failure inside the console itself.
    Internal,
}

/// The main error type for admin console operations.
#[derive(Debug, Error)]
pub enum AdminError {
    // ==================== Network Errors ====================
    /// The backend could not be reached.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,

    /// The backend is temporarily unavailable.
    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },

    // ==================== Backend Rejections ====================
    /// The requested record was not found.
    #[error("Record not found: {collection} with {key}={value}")]
    NotFound {
        collection: String,
        key: String,
        value: String,
    },

    /// A constraint was violated.
    #[error("Conflict in {collection}: {reason}")]
    Conflict { collection: String, reason: String },

    /// The current actor may not perform this operation.
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// No actor is signed in.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The credentials were rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The named collection does not exist.
    #[error("Unknown collection: {collection}")]
    UnknownCollection { collection: String },

    /// The named procedure does not exist.
    #[error("Unknown procedure: {name}")]
    UnknownProcedure { name: String },

    /// Any other backend-reported failure.
    #[error("Backend error: {message}")]
    Backend { message: String },

    // ==================== Validation Errors ====================
    /// A field value is invalid.
    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A date range with its start after its end.
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    /// A destructive operation was attempted without confirmation.
    #[error("Confirmation required to {action}")]
    ConfirmationRequired { action: String },

    /// A previous submission is still in flight.
    #[error("Another operation is in progress")]
    Busy,

    // ==================== Internal Errors ====================
    /// Serialization/deserialization failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Local I/O failed.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// An internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AdminError {
    /// Creates a new backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(
        collection: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a new conflict error.
    pub fn conflict(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } | Self::Timeout | Self::Unavailable { .. } => {
                ErrorCategory::Network
            }
            Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::PermissionDenied { .. }
            | Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::UnknownCollection { .. }
            | Self::UnknownProcedure { .. }
            | Self::Backend { .. } => ErrorCategory::Rejected,
            Self::Validation { .. }
            | Self::InvalidRange { .. }
            | Self::ConfirmationRequired { .. }
            | Self::Busy => ErrorCategory::Validation,
            Self::Serialization { .. } | Self::Io { .. } | Self::Internal { .. } => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns true if the operator can fix this by changing the input.
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Validation)
            || matches!(self, Self::InvalidCredentials | Self::NotAuthenticated)
    }

    /// Returns an HTTP-style status code appropriate for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::NotAuthenticated => 401,
            Self::PermissionDenied { .. } => 403,
            Self::NotFound { .. } | Self::UnknownCollection { .. } | Self::UnknownProcedure { .. } => {
                404
            }
            Self::Timeout => 408,
            Self::Conflict { .. } | Self::Busy => 409,
            Self::Validation { .. }
            | Self::InvalidRange { .. }
            | Self::ConfirmationRequired { .. } => 422,
            Self::Unavailable { .. } | Self::Network { .. } => 503,
            _ => 500,
        }
    }
}

/// A Result type alias using AdminError.
pub type AdminResult<T> = Result<T, AdminError>;

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AdminError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdminError::not_found("books", "id", "b1");
        assert_eq!(err.to_string(), "Record not found: books with id=b1");
    }

    #[test]
    fn test_categories() {
        assert_eq!(AdminError::Timeout.category(), ErrorCategory::Network);
        assert_eq!(
            AdminError::conflict("banners", "duplicate").category(),
            ErrorCategory::Rejected
        );
        assert_eq!(
            AdminError::validation("title", "required").category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AdminError::InvalidCredentials.status_code(), 401);
        assert_eq!(AdminError::permission_denied("no").status_code(), 403);
        assert_eq!(AdminError::validation("x", "y").status_code(), 422);
        assert_eq!(AdminError::Busy.status_code(), 409);
    }

    #[test]
    fn test_is_user_error() {
        assert!(AdminError::validation("title", "empty").is_user_error());
        assert!(!AdminError::internal("boom").is_user_error());
    }
}
