//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Two Levels
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │  db.carts().add_item(cart_id, 42, 2)                           │
//! │       ▼                                                                 │
//! │  CartRepository            ← one Transaction Scope per call            │
//! │       │                                                                 │
//! │       │  cart::add_item(&mut conn, cart_id, 42, 2)                     │
//! │       ▼                                                                 │
//! │  connection-level fns      ← take the Scope's connection, compose      │
//! │       │                       freely inside one unit of work           │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Users and stored credentials
//! - [`CatalogRepository`](product::CatalogRepository) - Categories and products
//! - [`CartRepository`](cart::CartRepository) - Active cart and its items
//! - [`OrderRepository`](order::OrderRepository) - Checkout and order lookups

pub mod cart;
pub mod order;
pub mod product;
pub mod user;
