//! # Storage Errors
//!
//! Every failure a repository or a Transaction Scope can report.
//!
//! ```text
//!   sqlx::Error ──From──► DbError ──► scope rolls back, same value returned
//!                            │
//!                            └─ kind() ──► ErrorKind (NotFound, Conflict, ..)
//! ```
//!
//! SQLite constraint messages are parsed once, here, so repositories can
//! match on `UniqueViolation { field, .. }` instead of message text.

use storefront_core::{CartId, CoreError, ErrorKind, OrderId, ValidationError};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// No such row, or the cart is no longer active.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A `UNIQUE` index rejected the write (username, product name, ..).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A referenced row is missing.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A freshly drawn cart id is already taken, after every retry.
    #[error("Cart id {id} is already taken")]
    DuplicateCartId { id: CartId },

    /// The user already has an active cart.
    #[error("User {user_id} already has an active cart")]
    ActiveCartExists { user_id: i64 },

    /// No line for this product in this cart.
    #[error("Product {product_id} is not in cart {cart_id}")]
    ItemNotFound { cart_id: CartId, product_id: i64 },

    /// Checkout of a cart with no items.
    #[error("Cart {cart_id} is empty")]
    CartEmpty { cart_id: CartId },

    /// An order with this id already exists.
    #[error("Order {order_id} already exists")]
    OrderConflict { order_id: OrderId },

    /// Nothing has been ordered yet.
    #[error("No orders exist")]
    NoOrdersExist,

    /// Caller input rejected before any statement ran.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The principal may not read this data.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// The pool could not be opened or is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other database-reported failure.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Commit or rollback of a Transaction Scope failed.
    #[error("Transaction failed during {stage}: {source}")]
    TransactionFailed {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A Transaction Scope exceeded one of its bounded waits.
    #[error("Transaction timed out while {0}")]
    TransactionTimeout(&'static str),

    /// A Transaction Scope was opened from inside another one.
    #[error("Transaction Scopes cannot be nested")]
    NestedTransaction,

    /// No connection became free within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// An environment variable holds an unusable value.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidConfig { key: String, value: String },

    /// Stored data that cannot be turned back into a domain value.
    #[error("Corrupt {entity} row: {reason}")]
    CorruptRow { entity: &'static str, reason: String },

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// `NotFound` for `entity` with display id `id`.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// `UniqueViolation` on `field`.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a CorruptRow error.
    pub fn corrupt(entity: &'static str, reason: impl ToString) -> Self {
        DbError::CorruptRow {
            entity,
            reason: reason.to_string(),
        }
    }

    /// Returns the caller-facing classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Validation(_)
            | DbError::CartEmpty { .. }
            | DbError::ForeignKeyViolation { .. } => ErrorKind::Validation,

            DbError::UniqueViolation { .. }
            | DbError::DuplicateCartId { .. }
            | DbError::ActiveCartExists { .. }
            | DbError::OrderConflict { .. } => ErrorKind::Conflict,

            DbError::NotFound { .. } | DbError::ItemNotFound { .. } | DbError::NoOrdersExist => {
                ErrorKind::NotFound
            }

            DbError::Forbidden(_) => ErrorKind::Authentication,

            DbError::TransactionFailed { .. } | DbError::NestedTransaction => {
                ErrorKind::Transaction
            }

            DbError::TransactionTimeout(_) => ErrorKind::TransactionTimeout,

            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::InvalidConfig { .. }
            | DbError::CorruptRow { .. }
            | DbError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the `table.column` named by a unique violation, if any.
    pub(crate) fn unique_field(&self) -> Option<&str> {
        match self {
            DbError::UniqueViolation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if db_err.is_unique_violation() {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => DbError::Validation(e),
            CoreError::Forbidden { .. } => DbError::Forbidden(err.to_string()),
            CoreError::InvalidCartId { value, reason } => DbError::Validation(
                ValidationError::InvalidFormat {
                    field: format!("cart id '{value}'"),
                    reason,
                },
            ),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let id = CartId::new(1, 1).unwrap();

        assert_eq!(DbError::OrderConflict { order_id: id }.kind(), ErrorKind::Conflict);
        assert_eq!(DbError::ActiveCartExists { user_id: 1 }.kind(), ErrorKind::Conflict);
        assert_eq!(
            DbError::ItemNotFound {
                cart_id: id,
                product_id: 2
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(DbError::NestedTransaction.kind(), ErrorKind::Transaction);
        assert_eq!(
            DbError::TransactionTimeout("acquiring a connection").kind(),
            ErrorKind::TransactionTimeout
        );
        assert_eq!(DbError::not_found("Product", 9).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_core_error_conversion() {
        let err: DbError = CoreError::Forbidden {
            principal: 1,
            owner: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let err: DbError = "nope".parse::<CartId>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
