//! # Pool and Configuration
//!
//! Opens the store's SQLite pool and hands out repositories.
//!
//! ```text
//!   DbConfig (builder / from_env / in_memory)
//!        │
//!        ▼
//!   Database::new ──► SqlitePool ──► migrations (optional)
//!        │
//!        ├── users() / catalog() / carts() / orders()
//!        └── transaction(|conn| ..)   one pooled connection per scope,
//!                                     BEGIN IMMEDIATE .. COMMIT / ROLLBACK
//! ```
//!
//! File databases run in WAL mode, so reads proceed while a scope holds
//! the write lock. Concurrent scopes queue on that lock for at most
//! `busy_timeout`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cart::CartRepository;
use crate::repository::order::OrderRepository;
use crate::repository::product::CatalogRepository;
use crate::repository::user::UserRepository;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings and the bounded waits used by Transaction Scopes.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/storefront/store.db")
///     .max_connections(8)
///     .transaction_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Pool ceiling. Default: 5
    pub max_connections: u32,

    /// Connections kept open while idle. Default: 1
    pub min_connections: u32,

    /// Longest wait for a pooled connection.
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Longest a unit of work may run inside a Transaction Scope.
    /// Default: 30 seconds
    pub transaction_timeout: Duration,

    /// How long SQLite waits on a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Close connections idle for longer than this. Default: 10 minutes
    pub idle_timeout: Duration,

    /// Apply embedded migrations in `Database::new`. Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Defaults for a file database at `path` (created on first open).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            transaction_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Pool ceiling.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Idle floor.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the unit-of-work deadline for Transaction Scopes.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Toggle migrations on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private in-memory store, mostly for tests.
    ///
    /// The data lives on a single connection, so the pool holds exactly one
    /// and every scope queues behind the previous one.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            transaction_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    /// Builds a configuration from `STOREFRONT_*` environment variables.
    ///
    /// | Variable                               | Default         |
    /// |----------------------------------------|-----------------|
    /// | `STOREFRONT_DATABASE_PATH`             | `storefront.db` |
    /// | `STOREFRONT_DB_MAX_CONNECTIONS`        | 5               |
    /// | `STOREFRONT_DB_ACQUIRE_TIMEOUT_MS`     | 30000           |
    /// | `STOREFRONT_DB_TRANSACTION_TIMEOUT_MS` | 30000           |
    pub fn from_env() -> DbResult<Self> {
        let path = env::var("STOREFRONT_DATABASE_PATH").unwrap_or_else(|_| "storefront.db".into());
        let mut config = DbConfig::new(path);

        if let Some(max) = env_parse::<u32>("STOREFRONT_DB_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(ms) = env_parse::<u64>("STOREFRONT_DB_ACQUIRE_TIMEOUT_MS")? {
            config.acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("STOREFRONT_DB_TRANSACTION_TIMEOUT_MS")? {
            config.transaction_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }
}

fn env_parse<T: FromStr>(key: &str) -> DbResult<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DbError::InvalidConfig {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access and Transaction Scopes.
///
/// Cloning is cheap: the pool is reference counted. Pass it explicitly to
/// whatever needs storage; there is no global handle.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,

    /// Bounded waits applied by [`Database::transaction`].
    pub(crate) acquire_timeout: Duration,
    pub(crate) transaction_timeout: Duration,
}

impl Database {
    /// Opens the pool described by `config`.
    ///
    /// Every connection enforces foreign keys. File databases use WAL with
    /// `synchronous = NORMAL`. Migrations run last when enabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening storefront database"
        );

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .journal_mode(SqliteJournalMode::Wal)
                .create_if_missing(true)
        }
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

        debug!(busy_timeout = ?config.busy_timeout, "Connect options ready");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout));

        if config.is_in_memory() {
            // The data lives only as long as the connection does.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            acquire_timeout = ?config.acquire_timeout,
            transaction_timeout = ?config.transaction_timeout,
            "Pool ready"
        );

        let db = Database {
            pool,
            acquire_timeout: config.acquire_timeout,
            transaction_timeout: config.transaction_timeout,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending embedded migrations. Safe to repeat.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The underlying pool.
    ///
    /// For reads not covered by repositories. Writes go through
    /// [`Database::transaction`].
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the user repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }

    /// Returns the cart repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let cart = db.carts().create_active_cart(user.id).await?;
    /// db.carts().add_item(cart.id, 42, 2).await?;
    /// ```
    pub fn carts(&self) -> CartRepository {
        CartRepository::new(self.clone())
    }

    /// Returns the order repository.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.clone())
    }

    /// Returns the catalog (category + product) repository.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.clone())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        info!("Closing storefront database");
        self.pool.close().await;
    }

    /// `SELECT 1` round trip.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_opens_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'active_cart'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_builder_overrides() {
        let config = DbConfig::new("/tmp/storefront-builder.db")
            .max_connections(10)
            .min_connections(2)
            .transaction_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.transaction_timeout, Duration::from_millis(250));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let path = std::env::temp_dir().join(format!("storefront-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path)).await.unwrap();

        assert!(db.health_check().await);
        assert!(path.exists());

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
