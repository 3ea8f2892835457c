//! # Error Types
//!
//! Domain error types and the error taxonomy shared across the workspace.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core (this file)                                           │
//! │  ├── ErrorKind        - The caller-facing classification               │
//! │  ├── CoreError        - Identity / authorization rule failures         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db                                                         │
//! │  └── DbError          - Storage and Transaction Scope failures         │
//! │                                                                         │
//! │  storefront-auth                                                       │
//! │  └── AuthError        - Credential and token failures                  │
//! │                                                                         │
//! │  Every error type answers `kind()`, so the request layer can map any   │
//! │  failure to a status code without matching on every variant.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-visible classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed input (short password, non-positive quantity).
    Validation,
    /// Duplicate username, cart id, order id or product name.
    Conflict,
    /// Missing user, product, order or cart item.
    NotFound,
    /// Bad credentials, invalid or expired token, forbidden access.
    Authentication,
    /// The Transaction Scope could not commit or roll back cleanly.
    Transaction,
    /// The Transaction Scope ran out of time.
    TransactionTimeout,
    /// Anything the caller cannot act on (I/O, corrupt rows, config).
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Text that does not parse as `owner.sssss`.
    #[error("Invalid cart id '{value}': {reason}")]
    InvalidCartId { value: String, reason: String },

    /// The principal may not touch another user's data.
    #[error("User {principal} may not access data owned by user {owner}")]
    Forbidden { principal: i64, owner: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the caller-facing classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidCartId { .. } | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Forbidden { .. } => ErrorKind::Authentication,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Raised before any statement runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value exceeds its upper bound.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: i64 },

    /// Invalid format (e.g. an email without '@').
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for a missing field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Returns the name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::TooLarge { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("username");
        assert_eq!(err.to_string(), "username is required");

        let err = ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        };
        assert_eq!(err.to_string(), "password must be at least 6 characters");
        assert_eq!(err.field(), "password");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("email").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_forbidden_is_authentication_kind() {
        let err = CoreError::Forbidden {
            principal: 1,
            owner: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(
            err.to_string(),
            "User 1 may not access data owned by user 2"
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::TransactionTimeout).unwrap();
        assert_eq!(json, "\"transaction_timeout\"");
    }
}
