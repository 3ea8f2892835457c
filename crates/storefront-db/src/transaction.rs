//! # Transaction Scope
//!
//! All-or-nothing boundary around one or more writes.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Database::transaction(work)                          │
//! │                                                                         │
//! │  already inside a Scope on this task? ──yes──► NestedTransaction       │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  acquire connection   (≤ acquire_timeout) ──late──► TransactionTimeout │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE      (takes the write lock up front)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  work(&mut conn)      (≤ transaction_timeout)                          │
//! │       │                                                                 │
//! │       ├── Ok(v)  ──► COMMIT ──ok──► Ok(v)                              │
//! │       │                 └──err──► ROLLBACK, TransactionFailed          │
//! │       ├── Err(e) ──► ROLLBACK ──► Err(e)          (e is unchanged)     │
//! │       └── late   ──► ROLLBACK ──► TransactionTimeout                   │
//! │                                                                         │
//! │  A connection whose COMMIT or ROLLBACK failed is closed, not pooled.   │
//! │  A cancelled Scope drops its sqlx Transaction, which rolls back.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let item = db
//!     .transaction(move |conn| {
//!         Box::pin(async move {
//!             let cart = cart::create_active_cart(conn, user_id).await?;
//!             cart::add_item(conn, cart.id, product_id, quantity).await
//!         })
//!     })
//!     .await?;
//! ```
//!
//! Composite operations are one unit of work calling the connection-level
//! functions; a unit of work that opens another Scope gets
//! `DbError::NestedTransaction`.

use futures_util::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Sqlite, SqliteConnection};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;

tokio::task_local! {
    /// Set while a unit of work runs.
    static IN_SCOPE: ();
}

/// Closes instead of pooling a connection whose rollback failed.
fn discard_if_failed(conn: &mut PoolConnection<Sqlite>, rolled_back: Result<(), sqlx::Error>) {
    if let Err(e) = rolled_back {
        warn!(error = %e, "Rollback failed, discarding connection");
        conn.close_on_drop();
    }
}

fn is_locked(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.message().contains("database is locked"))
}

impl Database {
    /// Runs `work` inside a Transaction Scope.
    ///
    /// ## Returns
    /// * `Ok(T)` - `work` succeeded and the transaction committed
    /// * `Err(e)` - `work` failed with `e`; everything it did was rolled back
    /// * `Err(DbError::TransactionFailed)` - COMMIT failed (rolled back)
    /// * `Err(DbError::TransactionTimeout)` - acquire, write lock or unit of
    ///   work ran late
    /// * `Err(DbError::NestedTransaction)` - called from inside another Scope
    pub async fn transaction<T, F>(&self, work: F) -> DbResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, DbResult<T>> + Send,
    {
        if IN_SCOPE.try_with(|_| ()).is_ok() {
            return Err(DbError::NestedTransaction);
        }

        let mut conn = match timeout(self.acquire_timeout, self.pool().acquire()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(sqlx::Error::PoolTimedOut)) | Err(_) => {
                warn!("Timed out acquiring a connection for a transaction");
                return Err(DbError::TransactionTimeout("acquiring a connection"));
            }
            Ok(Err(e)) => return Err(e.into()),
        };

        // Takes the write lock up front; waits at most busy_timeout for it.
        let mut tx = match conn.begin_with("BEGIN IMMEDIATE").await {
            Ok(tx) => tx,
            Err(e) if is_locked(&e) => {
                warn!("Timed out waiting for the write lock");
                return Err(DbError::TransactionTimeout("waiting for the write lock"));
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Transaction started");

        let outcome = IN_SCOPE
            .scope((), timeout(self.transaction_timeout, work(&mut *tx)))
            .await;

        match outcome {
            Ok(Ok(value)) => match tx.commit().await {
                Ok(()) => {
                    debug!("Transaction committed");
                    Ok(value)
                }
                Err(source) => {
                    // The dropped transaction never committed; the
                    // connection's state is unknown.
                    warn!(error = %source, "Commit failed, discarding connection");
                    conn.close_on_drop();
                    Err(DbError::TransactionFailed {
                        stage: "commit",
                        source,
                    })
                }
            },
            Ok(Err(err)) => {
                warn!(error = %err, "Unit of work failed, rolling back");
                let rolled_back = tx.rollback().await;
                discard_if_failed(&mut conn, rolled_back);
                Err(err)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.transaction_timeout.as_millis() as u64,
                    "Unit of work timed out, rolling back"
                );
                let rolled_back = tx.rollback().await;
                discard_if_failed(&mut conn, rolled_back);
                Err(DbError::TransactionTimeout("running the unit of work"))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
