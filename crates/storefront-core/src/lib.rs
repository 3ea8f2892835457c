//! # storefront-core: Pure Domain Model for the Storefront
//!
//! This crate holds the types every other layer agrees on: users, carts,
//! orders, the cart/order identity scheme, input validation and the error
//! taxonomy. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request handlers / page components                 │   │
//! │  │        (outside this workspace, call the operations below)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    storefront-auth                              │   │
//! │  │        register, authenticate, issue_token, verify_token        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    storefront-db                                │   │
//! │  │   Transaction Scope, cart / order / user / catalog stores       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ storefront-core (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ identity  │  │   error   │  │ validation│  │   │
//! │  │   │  User     │  │  CartId   │  │ ErrorKind │  │   rules   │  │   │
//! │  │   │  Order    │  │  OrderId  │  │ Validation│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (User, ActiveCart, CartItem, Order, Product, ...)
//! - [`identity`] - The structured cart / order key
//! - [`error`] - Error taxonomy shared by every crate
//! - [`validation`] - Input rules checked before anything touches storage
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::CartId;
//!
//! // A cart is named by its owner and a session drawn from 100,000 buckets
//! let cart = CartId::new(7, 4213).unwrap();
//! assert_eq!(cart.to_string(), "7.04213");
//!
//! // Orders reuse the same key
//! let parsed: CartId = "7.04213".parse().unwrap();
//! assert_eq!(parsed, cart);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use identity::{CartId, OrderId};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of distinct session values a cart id can carry.
///
/// The canonical text form of a cart id is `owner.sssss`, so the session
/// occupies exactly five decimal places.
pub const CART_SESSION_SPACE: u32 = 100_000;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Default lifetime of a signed session token (one week).
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;
