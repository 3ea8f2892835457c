//! # Domain Types
//!
//! Core domain types used throughout the storefront.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │   ActiveCart    │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │──►│  id (CartId)    │──►│  id (= cart id) │       │
//! │  │  username       │   │  user_id        │   │  user_id        │       │
//! │  │  profile fields │   │  is_active      │   │  shipping       │       │
//! │  └─────────────────┘   └────────┬────────┘   │  products[]     │       │
//! │                                 │            └─────────────────┘       │
//! │                        ┌────────▼────────┐            ▲                 │
//! │                        │    CartItem     │  snapshot  │                 │
//! │                        │  product_id     │────────────┘                 │
//! │                        │  quantity       │   (OrderLine)                │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Credential material (derived key, salt) is deliberately absent from
//! [`User`]; it only exists inside the user repository and the credential
//! manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::identity::{CartId, OrderId};

// =============================================================================
// User
// =============================================================================

/// A registered customer, without credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Shipping profile.
    pub address: UserAddress,
    /// Deactivation is the only removal path.
    pub active: bool,
    pub is_admin: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Default shipping address kept on the user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserAddress {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Profile fields collected at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: UserAddress,
}

// =============================================================================
// Principal
// =============================================================================

/// The authenticated caller, passed explicitly to operations that need
/// authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl Principal {
    /// Checks that this principal may read data owned by `owner`.
    ///
    /// Users see their own data; admins see everyone's.
    pub fn ensure_can_access(&self, owner: i64) -> CoreResult<()> {
        if self.is_admin || self.user_id == owner {
            return Ok(());
        }

        Err(CoreError::Forbidden {
            principal: self.user_id,
            owner,
        })
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A product available in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Price in cents (smallest currency unit).
    pub price_cents: i64,
    pub category_id: Option<i64>,
}

/// Fields needed to create a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub category_id: Option<i64>,
}

// =============================================================================
// Cart
// =============================================================================

/// The single in-progress, unpaid cart of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCart {
    #[ts(as = "String")]
    pub id: CartId,
    pub user_id: i64,
    /// False once the cart has been checked out.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub checked_out_at: Option<DateTime<Utc>>,
}

/// One product line in a cart. At most one per (cart, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i64,
    #[ts(as = "String")]
    pub cart_id: CartId,
    pub product_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Order
// =============================================================================

/// Where and to whom an order ships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub ship_name: String,
    pub ship_address: String,
    pub ship_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub email: String,
}

/// A frozen (product, quantity) pair captured at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        OrderLine {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

/// Immutable snapshot of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Same value as the id of the cart that was checked out.
    #[ts(as = "String")]
    pub id: OrderId,
    pub user_id: i64,
    pub shipping: ShippingInfo,
    pub products: Vec<OrderLine>,
    pub shipped: bool,
    pub tracking_number: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across all lines.
    pub fn unit_count(&self) -> i64 {
        self.products.iter().map(|line| line.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(user_id: i64, is_admin: bool) -> Principal {
        Principal {
            user_id,
            username: format!("user{user_id}"),
            is_admin,
        }
    }

    #[test]
    fn test_principal_sees_own_data() {
        assert!(principal(3, false).ensure_can_access(3).is_ok());
    }

    #[test]
    fn test_principal_blocked_from_other_users() {
        let err = principal(3, false).ensure_can_access(4).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden { principal: 3, owner: 4 }));
    }

    #[test]
    fn test_admin_sees_everything() {
        assert!(principal(1, true).ensure_can_access(99).is_ok());
    }

    #[test]
    fn test_order_line_from_cart_item() {
        let item = CartItem {
            id: 10,
            cart_id: CartId::new(2, 5).unwrap(),
            product_id: 42,
            quantity: 2,
        };
        assert_eq!(
            OrderLine::from(&item),
            OrderLine {
                product_id: 42,
                quantity: 2
            }
        );
    }

    #[test]
    fn test_order_serializes_id_as_text() {
        let order = Order {
            id: CartId::new(2, 17).unwrap(),
            user_id: 2,
            shipping: ShippingInfo::default(),
            products: vec![
                OrderLine {
                    product_id: 1,
                    quantity: 2,
                },
                OrderLine {
                    product_id: 5,
                    quantity: 1,
                },
            ],
            shipped: false,
            tracking_number: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["id"], "2.00017");
        assert_eq!(json["products"][0]["productId"], 1);
        assert_eq!(order.unit_count(), 3);
    }
}
