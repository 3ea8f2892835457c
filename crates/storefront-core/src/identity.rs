//! # Cart / Order Identity
//!
//! A cart is named by the user who owns it plus a session number; the order
//! created at checkout keeps exactly the same name.
//!
//! ## Key Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CartId                                         │
//! │                                                                         │
//! │     owner (user id)        session (0 ..= 99,999)                      │
//! │          │                        │                                     │
//! │          ▼                        ▼                                     │
//! │          7          .           04213        ← canonical text form     │
//! │                                                                         │
//! │  ActiveCart.id ─────── checkout ───────► Order.id   (same value)       │
//! │                                                                         │
//! │  The text form reads as the decimal `owner + session / 100000`, but    │
//! │  the two parts are kept as separate integers, so no float ever takes   │
//! │  part in building or comparing a key.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};
use crate::CART_SESSION_SPACE;

/// Digits used by the session part of the text form.
const SESSION_DIGITS: usize = 5;

/// Structured key of an active cart and of the order it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CartId {
    owner: i64,
    session: u32,
}

/// Orders are keyed by the id of the cart they were created from.
pub type OrderId = CartId;

impl CartId {
    /// Builds a cart id from its parts.
    ///
    /// ## Errors
    /// `CoreError::InvalidCartId` if the owner is not a positive user id or
    /// the session falls outside the session space.
    pub fn new(owner: i64, session: u32) -> CoreResult<Self> {
        if owner <= 0 {
            return Err(CoreError::InvalidCartId {
                value: format!("{owner}.{session:05}"),
                reason: "owner must be a positive user id".to_string(),
            });
        }

        if session >= CART_SESSION_SPACE {
            return Err(CoreError::InvalidCartId {
                value: format!("{owner}.{session}"),
                reason: format!("session must be below {CART_SESSION_SPACE}"),
            });
        }

        Ok(CartId { owner, session })
    }

    /// Id of the user who owns the cart.
    #[inline]
    pub const fn owner(&self) -> i64 {
        self.owner
    }

    /// Session number inside the owner's key space.
    #[inline]
    pub const fn session(&self) -> u32 {
        self.session
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:0width$}", self.owner, self.session, width = SESSION_DIGITS)
    }
}

impl FromStr for CartId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidCartId {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (owner, session) = s
            .split_once('.')
            .ok_or_else(|| invalid("expected owner.session"))?;

        if session.len() != SESSION_DIGITS || !session.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("session must be exactly five digits"));
        }

        if owner.is_empty() || !owner.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("owner must be a decimal user id"));
        }

        let owner: i64 = owner.parse().map_err(|_| invalid("owner out of range"))?;
        let session: u32 = session.parse().map_err(|_| invalid("session out of range"))?;

        CartId::new(owner, session)
    }
}

impl Serialize for CartId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CartId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
