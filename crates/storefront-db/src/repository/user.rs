//! # User Repository
//!
//! Database operations for users and their stored credentials.
//!
//! Users are never deleted; [`deactivate`] flips the `active` flag.
//! Credential columns only leave this module inside [`StoredCredentials`].

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use storefront_core::{User, UserAddress, UserProfile};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, address, city, state, \
                            zip, active, is_admin, created_at";

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    address: String,
    city: String,
    state: String,
    zip: String,
    active: bool,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            address: UserAddress {
                address: row.address,
                city: row.city,
                state: row.state,
                zip: row.zip,
            },
            active: row.active,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password: String,
    salt: Vec<u8>,
}

/// A user plus the material needed to check a password.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user: User,
    /// Base64 derived key.
    pub password_hash: String,
    pub salt: Vec<u8>,
}

/// Everything needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Base64 derived key.
    pub password_hash: String,
    pub salt: Vec<u8>,
    pub profile: UserProfile,
    pub is_admin: bool,
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Inserts a user and returns the public view of it.
///
/// ## Returns
/// * `Err(DbError::UniqueViolation)` - username already taken
pub async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> DbResult<User> {
    debug!(username = %user.username, "Inserting user");

    let sql = format!(
        "INSERT INTO users (username, password, salt, email, first_name, last_name, \
                            address, city, state, zip, active, is_admin, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12) \
         RETURNING {USER_COLUMNS}"
    );

    let profile = &user.profile;
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.address.address)
        .bind(&profile.address.city)
        .bind(&profile.address.state)
        .bind(&profile.address.zip)
        .bind(user.is_admin)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", &user.username),
            other => other,
        })?;

    info!(user_id = row.id, username = %row.username, "User created");
    Ok(row.into())
}

/// Looks a user up by id.
pub async fn get_by_id<'e, E>(executor: E, id: i64) -> DbResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(User::from))
}

/// Looks a user up by exact username.
pub async fn get_by_username<'e, E>(executor: E, username: &str) -> DbResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(username)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(User::from))
}

/// Looks a user up by username, including credential material.
pub async fn get_credentials<'e, E>(
    executor: E,
    username: &str,
) -> DbResult<Option<StoredCredentials>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS}, password, salt FROM users WHERE username = ?1");
    let row = sqlx::query_as::<_, CredentialRow>(&sql)
        .bind(username)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(|row| StoredCredentials {
        user: row.user.into(),
        password_hash: row.password,
        salt: row.salt,
    }))
}

/// Turns a user's `active` flag off.
pub async fn deactivate(conn: &mut SqliteConnection, id: i64) -> DbResult<User> {
    debug!(user_id = id, "Deactivating user");

    let sql = format!("UPDATE users SET active = 0 WHERE id = ?1 RETURNING {USER_COLUMNS}");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))?;

    Ok(row.into())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.users();
/// let alice = repo.get_by_username("alice").await?;
/// ```
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    /// Inserts a user inside its own Transaction Scope.
    pub async fn insert(&self, user: NewUser) -> DbResult<User> {
        self.db
            .transaction(move |conn| Box::pin(async move { insert_user(conn, &user).await }))
            .await
    }

    /// Gets a user by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<User>> {
        get_by_id(self.db.pool(), id).await
    }

    /// Gets a user by username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        get_by_username(self.db.pool(), username).await
    }

    /// Gets a user and their stored credentials by username.
    pub async fn get_credentials(&self, username: &str) -> DbResult<Option<StoredCredentials>> {
        get_credentials(self.db.pool(), username).await
    }

    /// Returns true if the username is taken.
    pub async fn username_exists(&self, username: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)")
                .bind(username)
                .fetch_one(self.db.pool())
                .await?;

        Ok(exists)
    }

    /// Lists every user (public view), oldest first.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Deactivates a user. Inactive users cannot authenticate.
    pub async fn deactivate(&self, id: i64) -> DbResult<User> {
        self.db
            .transaction(move |conn| Box::pin(async move { deactivate(conn, id).await }))
            .await
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Inserts a user with placeholder credentials.
#[cfg(test)]
pub(crate) async fn insert_test_user(db: &Database, username: &str) -> User {
    db.users()
        .insert(NewUser {
            username: username.to_string(),
            password_hash: "not-a-real-key".to_string(),
            salt: vec![0; 16],
            profile: UserProfile::default(),
            is_admin: false,
        })
        .await
        .unwrap()
}

// =============================================================================
// Unit Tests
// =============================================================================
