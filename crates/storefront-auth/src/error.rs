//! Error types for the credential manager.

use storefront_core::{CoreError, ErrorKind, ValidationError};
use storefront_db::DbError;
use thiserror::Error;

use crate::config::ConfigError;

/// Credential manager errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username '{0}' is already taken")]
    UsernameConflict(String),

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Key derivation failed: {0}")]
    HashingFailure(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Invalid username or password")]
    BadCredentials,

    #[error("Account '{0}' is deactivated")]
    AccountInactive(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl AuthError {
    /// Returns the caller-facing classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UsernameConflict(_) => ErrorKind::Conflict,
            AuthError::WeakPassword { .. } | AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::UserNotFound(_) => ErrorKind::NotFound,
            AuthError::BadCredentials
            | AuthError::AccountInactive(_)
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::Forbidden(_) => ErrorKind::Authentication,
            AuthError::HashingFailure(_) | AuthError::Config(_) => ErrorKind::Internal,
            AuthError::Db(err) => err.kind(),
        }
    }
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => AuthError::Validation(e),
            CoreError::Forbidden { .. } => AuthError::Forbidden(err.to_string()),
            CoreError::InvalidCartId { .. } => AuthError::Db(err.into()),
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::HashingFailure(err.to_string())
    }
}

/// Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AuthError::BadCredentials.kind(), ErrorKind::Authentication);
        assert_eq!(AuthError::TokenExpired.kind(), ErrorKind::Authentication);
        assert_eq!(AuthError::WeakPassword { min: 6 }.kind(), ErrorKind::Validation);
        assert_eq!(
            AuthError::UsernameConflict("alice".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AuthError::Db(DbError::NestedTransaction).kind(),
            ErrorKind::Transaction
        );
    }

    #[test]
    fn test_forbidden_from_core() {
        let err: AuthError = CoreError::Forbidden {
            principal: 1,
            owner: 2,
        }
        .into();
        assert!(matches!(err, AuthError::Forbidden(_)));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
