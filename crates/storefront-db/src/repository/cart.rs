//! # Cart Repository
//!
//! Active-cart lifecycle and cart item aggregation.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cart Lifecycle                                    │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── create_active_cart(user) → ActiveCart { id: owner.sssss }      │
//! │         (one active cart per user, enforced by a partial unique index) │
//! │                                                                         │
//! │  2. FILL                                                               │
//! │     └── add_item(cart, product, n)   → quantity += n (one statement)   │
//! │     └── set_quantity(cart, product, n) → quantity = n                  │
//! │     └── remove_item(cart, product)                                     │
//! │                                                                         │
//! │  3. CHECK OUT (order repository, same Transaction Scope)               │
//! │     └── snapshot items → insert order → empty → deactivate             │
//! │                                                                         │
//! │  The deactivated row stays, so its id remains reserved for the order.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use storefront_core::validation::validate_quantity;
use storefront_core::{ActiveCart, CartId, CartItem, ValidationError, CART_SESSION_SPACE};

/// Session draws attempted before a collision is reported.
pub const MAX_CART_ID_DRAWS: usize = 3;

const CART_COLUMNS: &str = "id, user_id, is_active, created_at, checked_out_at";
const ITEM_COLUMNS: &str = "id, active_cart_id, product_id, quantity";

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct CartRow {
    id: String,
    user_id: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    checked_out_at: Option<DateTime<Utc>>,
}

impl TryFrom<CartRow> for ActiveCart {
    type Error = DbError;

    fn try_from(row: CartRow) -> DbResult<Self> {
        Ok(ActiveCart {
            id: row.id.parse().map_err(|e| DbError::corrupt("active_cart", e))?,
            user_id: row.user_id,
            is_active: row.is_active,
            created_at: row.created_at,
            checked_out_at: row.checked_out_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    active_cart_id: String,
    product_id: i64,
    quantity: i64,
}

impl TryFrom<ItemRow> for CartItem {
    type Error = DbError;

    fn try_from(row: ItemRow) -> DbResult<Self> {
        Ok(CartItem {
            id: row.id,
            cart_id: row
                .active_cart_id
                .parse()
                .map_err(|e| DbError::corrupt("active_cart_items", e))?,
            product_id: row.product_id,
            quantity: row.quantity,
        })
    }
}

fn into_items(rows: Vec<ItemRow>) -> DbResult<Vec<CartItem>> {
    rows.into_iter().map(CartItem::try_from).collect()
}

/// Draws a session uniformly from the session space.
pub fn draw_session() -> u32 {
    rand::rng().random_range(0..CART_SESSION_SPACE)
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Inserts a cart with exactly this id.
///
/// ## Returns
/// * `Err(DbError::DuplicateCartId)` - id already used (by any cart, active or not)
/// * `Err(DbError::ActiveCartExists)` - the owner already has an active cart
/// * `Err(DbError::NotFound)` - no such user
pub async fn insert_cart(conn: &mut SqliteConnection, id: CartId) -> DbResult<ActiveCart> {
    let sql = format!(
        "INSERT INTO active_cart (id, user_id, session, is_active, created_at) \
         VALUES (?1, ?2, ?3, 1, ?4) RETURNING {CART_COLUMNS}"
    );

    let row = sqlx::query_as::<_, CartRow>(&sql)
        .bind(id.to_string())
        .bind(id.owner())
        .bind(id.session())
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.unique_field() == Some("active_cart.id") => DbError::DuplicateCartId { id },
            err if err.unique_field().is_some() => DbError::ActiveCartExists {
                user_id: id.owner(),
            },
            DbError::ForeignKeyViolation { .. } => DbError::not_found("User", id.owner()),
            other => other,
        })?;

    row.try_into()
}

/// Opens a cart for `user_id`, drawing sessions from `draw`.
///
/// A drawn id that is already taken is retried, up to
/// [`MAX_CART_ID_DRAWS`] draws in total.
pub async fn create_active_cart_with<D>(
    conn: &mut SqliteConnection,
    user_id: i64,
    mut draw: D,
) -> DbResult<ActiveCart>
where
    D: FnMut() -> u32 + Send,
{
    let mut attempt = 1;
    loop {
        let id = CartId::new(user_id, draw())?;
        match insert_cart(conn, id).await {
            Ok(cart) => {
                info!(cart_id = %cart.id, user_id, "Active cart created");
                return Ok(cart);
            }
            Err(DbError::DuplicateCartId { .. }) if attempt < MAX_CART_ID_DRAWS => {
                warn!(cart_id = %id, attempt, "Cart id collision, drawing again");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Opens a cart for `user_id` with a random session.
pub async fn create_active_cart(conn: &mut SqliteConnection, user_id: i64) -> DbResult<ActiveCart> {
    create_active_cart_with(conn, user_id, draw_session).await
}

/// Gets a cart by id, active or not.
pub async fn get_cart<'e, E>(executor: E, id: CartId) -> DbResult<Option<ActiveCart>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {CART_COLUMNS} FROM active_cart WHERE id = ?1");
    sqlx::query_as::<_, CartRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?
        .map(ActiveCart::try_from)
        .transpose()
}

/// Gets the user's active cart, if any.
pub async fn get_active_cart<'e, E>(executor: E, user_id: i64) -> DbResult<Option<ActiveCart>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {CART_COLUMNS} FROM active_cart WHERE user_id = ?1 AND is_active = 1");
    sqlx::query_as::<_, CartRow>(&sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .map(ActiveCart::try_from)
        .transpose()
}

/// Adds `quantity` of a product to an active cart.
///
/// One statement: inserts the line, or adds to the existing line's quantity.
/// Concurrent adds of the same product never lose an increment.
///
/// ## Returns
/// * `Err(DbError::Validation)` - `quantity <= 0`, or the line total would
///   exceed `i64::MAX`
/// * `Err(DbError::NotFound)` - cart is not active, or product doesn't exist
pub async fn add_item(
    conn: &mut SqliteConnection,
    cart_id: CartId,
    product_id: i64,
    quantity: i64,
) -> DbResult<CartItem> {
    validate_quantity(quantity)?;

    debug!(cart_id = %cart_id, product_id, quantity, "Adding cart item");

    let sql = format!(
        "INSERT INTO active_cart_items (active_cart_id, product_id, quantity) \
         SELECT ?1, ?2, ?3 \
         WHERE EXISTS (SELECT 1 FROM active_cart WHERE id = ?1 AND is_active = 1) \
         ON CONFLICT (active_cart_id, product_id) \
         DO UPDATE SET quantity = quantity + excluded.quantity \
         WHERE quantity <= ?4 - excluded.quantity \
         RETURNING {ITEM_COLUMNS}"
    );

    let row = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(cart_id.to_string())
        .bind(product_id)
        .bind(quantity)
        .bind(i64::MAX)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::ForeignKeyViolation { .. } => DbError::not_found("Product", product_id),
            other => other,
        })?;

    match row {
        Some(row) => row.try_into(),
        // An active cart always yields a row unless the increment was refused.
        None if is_active(&mut *conn, cart_id).await? => {
            warn!(cart_id = %cart_id, product_id, quantity, "Cart line quantity would overflow");
            Err(ValidationError::TooLarge {
                field: "quantity".to_string(),
                max: i64::MAX,
            }
            .into())
        }
        None => Err(DbError::not_found("Active cart", cart_id)),
    }
}

async fn is_active(conn: &mut SqliteConnection, cart_id: CartId) -> DbResult<bool> {
    let active: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM active_cart WHERE id = ?1 AND is_active = 1)",
    )
    .bind(cart_id.to_string())
    .fetch_one(conn)
    .await?;

    Ok(active)
}

/// Replaces the quantity of an existing line.
///
/// ## Returns
/// * `Err(DbError::Validation)` - `quantity <= 0`
/// * `Err(DbError::ItemNotFound)` - no line for this product
pub async fn set_quantity(
    conn: &mut SqliteConnection,
    cart_id: CartId,
    product_id: i64,
    quantity: i64,
) -> DbResult<CartItem> {
    validate_quantity(quantity)?;

    debug!(cart_id = %cart_id, product_id, quantity, "Setting cart item quantity");

    let sql = format!(
        "UPDATE active_cart_items SET quantity = ?3 \
         WHERE active_cart_id = ?1 AND product_id = ?2 \
         RETURNING {ITEM_COLUMNS}"
    );

    sqlx::query_as::<_, ItemRow>(&sql)
        .bind(cart_id.to_string())
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(conn)
        .await?
        .ok_or(DbError::ItemNotFound {
            cart_id,
            product_id,
        })?
        .try_into()
}

/// Removes one product's line from one cart.
pub async fn remove_item(
    conn: &mut SqliteConnection,
    cart_id: CartId,
    product_id: i64,
) -> DbResult<CartItem> {
    debug!(cart_id = %cart_id, product_id, "Removing cart item");

    let sql = format!(
        "DELETE FROM active_cart_items WHERE active_cart_id = ?1 AND product_id = ?2 \
         RETURNING {ITEM_COLUMNS}"
    );

    sqlx::query_as::<_, ItemRow>(&sql)
        .bind(cart_id.to_string())
        .bind(product_id)
        .fetch_optional(conn)
        .await?
        .ok_or(DbError::ItemNotFound {
            cart_id,
            product_id,
        })?
        .try_into()
}

/// Lists a cart's lines in insertion order.
pub async fn list_items<'e, E>(executor: E, cart_id: CartId) -> DbResult<Vec<CartItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {ITEM_COLUMNS} FROM active_cart_items WHERE active_cart_id = ?1 ORDER BY id");
    let rows = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(cart_id.to_string())
        .fetch_all(executor)
        .await?;

    into_items(rows)
}

/// Deletes every line of a cart and returns what was removed.
///
/// Emptying an empty (or unknown) cart returns an empty list.
pub async fn empty(conn: &mut SqliteConnection, cart_id: CartId) -> DbResult<Vec<CartItem>> {
    debug!(cart_id = %cart_id, "Emptying cart");

    let sql = format!("DELETE FROM active_cart_items WHERE active_cart_id = ?1 RETURNING {ITEM_COLUMNS}");
    let rows = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(cart_id.to_string())
        .fetch_all(conn)
        .await?;

    let mut items = into_items(rows)?;
    items.sort_by_key(|item| item.id);
    Ok(items)
}

/// Marks a cart as checked out, freeing its owner to open a new one.
pub async fn deactivate(conn: &mut SqliteConnection, cart_id: CartId) -> DbResult<ActiveCart> {
    let sql = format!(
        "UPDATE active_cart SET is_active = 0, checked_out_at = ?2 \
         WHERE id = ?1 AND is_active = 1 RETURNING {CART_COLUMNS}"
    );

    sqlx::query_as::<_, CartRow>(&sql)
        .bind(cart_id.to_string())
        .bind(Utc::now())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Active cart", cart_id))?
        .try_into()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart operations. Each write runs in its own
/// Transaction Scope.
///
/// ## Usage
/// ```rust,ignore
/// let carts = db.carts();
/// let cart = carts.create_active_cart(user.id).await?;
/// carts.add_item(cart.id, 42, 2).await?;
/// carts.add_item(cart.id, 42, 3).await?;   // one line, quantity 5
/// ```
#[derive(Debug, Clone)]
pub struct CartRepository {
    db: Database,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(db: Database) -> Self {
        CartRepository { db }
    }

    /// Opens the user's active cart.
    pub async fn create_active_cart(&self, user_id: i64) -> DbResult<ActiveCart> {
        self.db
            .transaction(move |conn| {
                Box::pin(async move { create_active_cart(conn, user_id).await })
            })
            .await
    }

    /// Returns the user's active cart, if they have one open.
    pub async fn get_active_cart(&self, user_id: i64) -> DbResult<Option<ActiveCart>> {
        get_active_cart(self.db.pool(), user_id).await
    }

    /// Gets any cart (active or checked out) by id.
    pub async fn get_cart(&self, cart_id: CartId) -> DbResult<Option<ActiveCart>> {
        get_cart(self.db.pool(), cart_id).await
    }

    /// Opens a cart and adds its first item as one unit of work.
    pub async fn start_cart_with_item(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<(ActiveCart, CartItem)> {
        validate_quantity(quantity)?;

        self.db
            .transaction(move |conn| {
                Box::pin(async move {
                    let cart = create_active_cart(conn, user_id).await?;
                    let item = add_item(conn, cart.id, product_id, quantity).await?;
                    Ok((cart, item))
                })
            })
            .await
    }

    /// Adds to a cart line, creating it if needed.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<CartItem> {
        validate_quantity(quantity)?;

        self.db
            .transaction(move |conn| {
                Box::pin(async move { add_item(conn, cart_id, product_id, quantity).await })
            })
            .await
    }

    /// Replaces the quantity of a cart line.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: i64,
        quantity: i64,
    ) -> DbResult<CartItem> {
        validate_quantity(quantity)?;

        self.db
            .transaction(move |conn| {
                Box::pin(async move { set_quantity(conn, cart_id, product_id, quantity).await })
            })
            .await
    }

    /// Removes a product from a cart.
    pub async fn remove_item(&self, cart_id: CartId, product_id: i64) -> DbResult<CartItem> {
        self.db
            .transaction(move |conn| {
                Box::pin(async move { remove_item(conn, cart_id, product_id).await })
            })
            .await
    }

    /// Lists a cart's lines (no Transaction Scope).
    pub async fn list_items(&self, cart_id: CartId) -> DbResult<Vec<CartItem>> {
        list_items(self.db.pool(), cart_id).await
    }

    /// Removes every line from a cart.
    pub async fn empty(&self, cart_id: CartId) -> DbResult<Vec<CartItem>> {
        self.db
            .transaction(move |conn| Box::pin(async move { empty(conn, cart_id).await }))
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::repository::product::insert_test_product;
    use crate::repository::user::insert_test_user;
    use std::path::PathBuf;
    use storefront_core::ErrorKind;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("storefront-{}.db", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_create_active_cart() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;

        let cart = db.carts().create_active_cart(alice.id).await.unwrap();
        assert_eq!(cart.id.owner(), alice.id);
        assert!(cart.id.session() < CART_SESSION_SPACE);
        assert!(cart.is_active);
        assert!(cart.checked_out_at.is_none());

        let found = db.carts().get_active_cart(alice.id).await.unwrap();
        assert_eq!(found, Some(cart));
    }

    #[tokio::test]
    async fn test_one_active_cart_per_user() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;

        db.carts().create_active_cart(alice.id).await.unwrap();
        let err = db.carts().create_active_cart(alice.id).await.unwrap_err();

        assert!(matches!(err, DbError::ActiveCartExists { user_id } if user_id == alice.id));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_cart_for_unknown_user() {
        let db = setup().await;
        let err = db.carts().create_active_cart(404).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cart_id_collision_retried() {
        let db = setup().await;
        let alice_id = insert_test_user(&db, "alice").await.id;

        // Take session 5, then check it out so a new cart may be opened.
        let first = db
            .transaction(move |conn| {
                Box::pin(async move {
                    let cart = create_active_cart_with(conn, alice_id, || 5).await?;
                    deactivate(conn, cart.id).await
                })
            })
            .await
            .unwrap();
        assert_eq!(first.id.session(), 5);

        let mut draws = vec![6u32, 5, 5].into_iter();
        let second = db
            .transaction(move |conn| {
                Box::pin(async move {
                    create_active_cart_with(conn, alice_id, move || draws.next_back().unwrap_or(0))
                        .await
                })
            })
            .await
            .unwrap();
        assert_eq!(second.id.session(), 6);
    }

    #[tokio::test]
    async fn test_cart_id_collision_gives_up() {
        let db = setup().await;
        let alice_id = insert_test_user(&db, "alice").await.id;

        let err = db
            .transaction(move |conn| {
                Box::pin(async move {
                    let cart = create_active_cart_with(conn, alice_id, || 5).await?;
                    deactivate(conn, cart.id).await?;
                    create_active_cart_with(conn, alice_id, || 5).await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::DuplicateCartId { id } if id.session() == 5));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_add_item_aggregates() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cart = db.carts().create_active_cart(alice.id).await.unwrap();

        let first = db.carts().add_item(cart.id, teapot.id, 2).await.unwrap();
        let second = db.carts().add_item(cart.id, teapot.id, 3).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);

        let items = db.carts().list_items(cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_add_item_refuses_overflowing_total() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cups = insert_test_product(&db, "Cups").await;
        let cart = db.carts().create_active_cart(alice.id).await.unwrap();

        db.carts().add_item(cart.id, teapot.id, i64::MAX).await.unwrap();
        let err = db.carts().add_item(cart.id, teapot.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::TooLarge { ref field, .. }) if field == "quantity"
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Exactly reaching the ceiling is still an increment.
        db.carts().add_item(cart.id, cups.id, i64::MAX - 1).await.unwrap();
        let full = db.carts().add_item(cart.id, cups.id, 1).await.unwrap();
        assert_eq!(full.quantity, i64::MAX);

        let items = db.carts().list_items(cart.id).await.unwrap();
        assert!(items.iter().all(|item| item.quantity == i64::MAX));
    }

    #[tokio::test]
    async fn test_add_item_rejects_bad_input() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cart = db.carts().create_active_cart(alice.id).await.unwrap();

        let err = db.carts().add_item(cart.id, teapot.id, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = db.carts().add_item(cart.id, 999, 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Product"));

        let ghost = CartId::new(alice.id, (cart.id.session() + 1) % CART_SESSION_SPACE).unwrap();
        let err = db.carts().add_item(ghost, teapot.id, 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Active cart"));

        assert!(db.carts().list_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_item_to_checked_out_cart() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cart = db.carts().create_active_cart(alice.id).await.unwrap();

        let cart_id = cart.id;
        db.transaction(move |conn| Box::pin(async move { deactivate(conn, cart_id).await }))
            .await
            .unwrap();

        let err = db.carts().add_item(cart.id, teapot.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_set_quantity_and_remove() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cups = insert_test_product(&db, "Cups").await;
        let cart = db.carts().create_active_cart(alice.id).await.unwrap();

        db.carts().add_item(cart.id, teapot.id, 2).await.unwrap();
        db.carts().add_item(cart.id, cups.id, 6).await.unwrap();

        let item = db.carts().set_quantity(cart.id, teapot.id, 9).await.unwrap();
        assert_eq!(item.quantity, 9);

        let err = db.carts().set_quantity(cart.id, teapot.id, -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let removed = db.carts().remove_item(cart.id, cups.id).await.unwrap();
        assert_eq!(removed.quantity, 6);

        let err = db.carts().remove_item(cart.id, cups.id).await.unwrap_err();
        assert!(matches!(err, DbError::ItemNotFound { product_id, .. } if product_id == cups.id));

        let err = db.carts().set_quantity(cart.id, cups.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let items = db.carts().list_items(cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, teapot.id);
    }

    #[tokio::test]
    async fn test_remove_only_touches_one_cart() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let bob = insert_test_user(&db, "bob").await;
        let teapot = insert_test_product(&db, "Teapot").await;

        let (alice_cart, _) = db
            .carts()
            .start_cart_with_item(alice.id, teapot.id, 1)
            .await
            .unwrap();
        let (bob_cart, _) = db
            .carts()
            .start_cart_with_item(bob.id, teapot.id, 4)
            .await
            .unwrap();

        db.carts().remove_item(alice_cart.id, teapot.id).await.unwrap();

        let bob_items = db.carts().list_items(bob_cart.id).await.unwrap();
        assert_eq!(bob_items.len(), 1);
        assert_eq!(bob_items[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_empty_is_idempotent() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cups = insert_test_product(&db, "Cups").await;
        let cart = db.carts().create_active_cart(alice.id).await.unwrap();

        db.carts().add_item(cart.id, teapot.id, 1).await.unwrap();
        db.carts().add_item(cart.id, cups.id, 2).await.unwrap();

        let removed = db.carts().empty(cart.id).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].product_id, teapot.id);

        assert!(db.carts().empty(cart.id).await.unwrap().is_empty());
        assert!(db.carts().list_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_cart_with_item_is_atomic() {
        let db = setup().await;
        let alice = insert_test_user(&db, "alice").await;

        // Unknown product: the cart must not be left behind.
        let err = db
            .carts()
            .start_cart_with_item(alice.id, 999, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.carts().get_active_cart(alice.id).await.unwrap().is_none());

        let teapot = insert_test_product(&db, "Teapot").await;
        let (cart, item) = db
            .carts()
            .start_cart_with_item(alice.id, teapot.id, 2)
            .await
            .unwrap();
        assert_eq!(item.cart_id, cart.id);
        assert_eq!(item.quantity, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_adds_never_lose_an_update() {
        let path = scratch_path();
        let db = Database::new(DbConfig::new(&path).max_connections(5))
            .await
            .unwrap();

        let alice = insert_test_user(&db, "alice").await;
        let teapot = insert_test_product(&db, "Teapot").await;
        let cart_id = db.carts().create_active_cart(alice.id).await.unwrap().id;
        let product_id = teapot.id;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let carts = db.carts();
            handles.push(tokio::spawn(async move {
                carts.add_item(cart_id, product_id, 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let items = db.carts().list_items(cart_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
