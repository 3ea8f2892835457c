//! # Order Repository
//!
//! Snapshots an active cart into an immutable order keyed by the same id.
//!
//! ## Checkout (one Transaction Scope)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       create_order(cart_id, shipping)                   │
//! │                                                                         │
//! │  1. order with this id exists?            ──yes──► OrderConflict       │
//! │  2. cart exists?                          ──no───► NotFound            │
//! │  3. snapshot cart items                   ──none─► CartEmpty           │
//! │  4. INSERT order (id = cart id, lines as JSON)                         │
//! │  5. empty the cart                                                     │
//! │  6. deactivate the cart                                                │
//! │                                                                         │
//! │  COMMIT ← all six or nothing                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::cart;
use storefront_core::validation::validate_shipping;
use storefront_core::{CartId, Order, OrderId, OrderLine, Principal, ShippingInfo};

const ORDER_COLUMNS: &str = "id, order_user_id, ship_name, ship_address, ship_address2, city, \
                             state, zip, email, shipped, tracking_number, order_products, \
                             created_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    order_user_id: i64,
    ship_name: String,
    ship_address: String,
    ship_address2: Option<String>,
    city: String,
    state: String,
    zip: String,
    email: String,
    shipped: bool,
    tracking_number: Option<String>,
    order_products: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> DbResult<Self> {
        let products: Vec<OrderLine> = serde_json::from_str(&row.order_products)
            .map_err(|e| DbError::corrupt("orders", e))?;

        Ok(Order {
            id: row.id.parse().map_err(|e| DbError::corrupt("orders", e))?,
            user_id: row.order_user_id,
            shipping: ShippingInfo {
                ship_name: row.ship_name,
                ship_address: row.ship_address,
                ship_address2: row.ship_address2,
                city: row.city,
                state: row.state,
                zip: row.zip,
                email: row.email,
            },
            products,
            shipped: row.shipped,
            tracking_number: row.tracking_number,
            created_at: row.created_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Returns true if an order with this id exists.
pub async fn order_exists<'e, E>(executor: E, order_id: OrderId) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = ?1)")
        .bind(order_id.to_string())
        .fetch_one(executor)
        .await?;

    Ok(exists)
}

/// Inserts an order row. Touches nothing else.
///
/// ## Returns
/// * `Err(DbError::OrderConflict)` - an order with this id already exists
pub async fn insert_order(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    user_id: i64,
    shipping: &ShippingInfo,
    lines: &[OrderLine],
) -> DbResult<Order> {
    let products =
        serde_json::to_string(lines).map_err(|e| DbError::Internal(e.to_string()))?;

    let sql = format!(
        "INSERT INTO orders (id, order_user_id, ship_name, ship_address, ship_address2, \
                             city, state, zip, email, shipped, tracking_number, \
                             order_products, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, NULL, ?10, ?11) \
         RETURNING {ORDER_COLUMNS}"
    );

    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id.to_string())
        .bind(user_id)
        .bind(&shipping.ship_name)
        .bind(&shipping.ship_address)
        .bind(&shipping.ship_address2)
        .bind(&shipping.city)
        .bind(&shipping.state)
        .bind(&shipping.zip)
        .bind(&shipping.email)
        .bind(products)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::OrderConflict { order_id },
            other => other,
        })?
        .try_into()
}

/// Checks out a cart: all steps run on `conn`, so they share the caller's
/// Transaction Scope.
pub async fn create_order(
    conn: &mut SqliteConnection,
    cart_id: CartId,
    shipping: &ShippingInfo,
) -> DbResult<Order> {
    if order_exists(&mut *conn, cart_id).await? {
        return Err(DbError::OrderConflict { order_id: cart_id });
    }

    let cart = cart::get_cart(&mut *conn, cart_id)
        .await?
        .ok_or_else(|| DbError::not_found("Active cart", cart_id))?;

    let lines: Vec<OrderLine> = cart::list_items(&mut *conn, cart_id)
        .await?
        .iter()
        .map(OrderLine::from)
        .collect();

    if lines.is_empty() {
        return Err(DbError::CartEmpty { cart_id });
    }

    debug!(cart_id = %cart_id, lines = lines.len(), "Snapshotting cart into order");

    let order = insert_order(conn, cart_id, cart.user_id, shipping, &lines).await?;
    cart::empty(conn, cart_id).await?;
    cart::deactivate(conn, cart_id).await?;

    info!(
        order_id = %order.id,
        user_id = order.user_id,
        units = order.unit_count(),
        "Order created"
    );
    Ok(order)
}

/// Gets an order by id.
pub async fn get_order<'e, E>(executor: E, order_id: OrderId) -> DbResult<Order>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id.to_string())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))?
        .try_into()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    db: Database,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(db: Database) -> Self {
        OrderRepository { db }
    }

    /// Checks out a cart into a new order.
    ///
    /// ## Returns
    /// * `Ok(Order)` - order keyed by `cart_id`; the cart is empty and inactive
    /// * `Err(DbError::OrderConflict)` - the cart was already checked out
    /// * `Err(DbError::CartEmpty)` - nothing to order
    /// * `Err(DbError::NotFound)` - unknown cart
    pub async fn create_order(&self, cart_id: CartId, shipping: ShippingInfo) -> DbResult<Order> {
        validate_shipping(&shipping)?;

        self.db
            .transaction(move |conn| {
                Box::pin(async move { create_order(conn, cart_id, &shipping).await })
            })
            .await
    }

    /// Gets an order by id.
    pub async fn get_order(&self, order_id: OrderId) -> DbResult<Order> {
        get_order(self.db.pool(), order_id).await
    }

    /// Gets an order, if `principal` may see it.
    pub async fn get_order_for(&self, principal: &Principal, order_id: OrderId) -> DbResult<Order> {
        let order = self.get_order(order_id).await?;
        principal.ensure_can_access(order.user_id)?;
        Ok(order)
    }

    /// Lists a user's orders, oldest first. Possibly empty.
    pub async fn get_orders_by_user(&self, user_id: i64) -> DbResult<Vec<Order>> {
        let sql =
            format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_user_id = ?1 ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        into_orders(rows)
    }

    /// Lists a user's orders, if `principal` may see them.
    pub async fn get_orders_by_user_for(
        &self,
        principal: &Principal,
        user_id: i64,
    ) -> DbResult<Vec<Order>> {
        principal.ensure_can_access(user_id)?;
        self.get_orders_by_user(user_id).await
    }

    /// Lists every order, oldest first.
    ///
    /// ## Returns
    /// * `Err(DbError::NoOrdersExist)` - nothing has been ordered yet
    pub async fn list_orders(&self) -> DbResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(self.db.pool())
            .await?;

        if rows.is_empty() {
            return Err(DbError::NoOrdersExist);
        }

        into_orders(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
