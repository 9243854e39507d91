//! # Domain Types
//!
//! Core domain types shared by the ledgers.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Identity     │   │    Product      │   │ LoyaltyAccount  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Guest          │   │  id             │   │  user_id        │       │
//! │  │  User(id)       │   │  price          │   │  balance        │       │
//! │  │                 │   │  discount_price │   │  lifetime_earned│       │
//! │  │                 │   │  stock (live)   │   │  version        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │      Tier       │   │ShippingSelection│                              │
//! │  │  ─────────────  │   │  ─────────────  │                              │
//! │  │  BASE < MID     │   │  Pickup         │                              │
//! │  │       < TOP     │   │  Delivery       │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are owned by the catalog, not by this crate. The ledgers only
//! read `price`, `discount_price` and `stock`; settlement is the one place
//! that writes stock back.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::loyalty::LoyaltyPolicy;
use crate::money::Money;

// =============================================================================
// Identity
// =============================================================================

/// Who owns a cart: a signed-in user, or the anonymous guest session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// Anonymous session.
    Guest,
    /// Signed-in user.
    User(String),
}

impl Identity {
    /// Storage key of the guest cart.
    pub const GUEST_KEY: &'static str = "guest";

    const USER_PREFIX: &'static str = "user:";

    /// Maps an optional session user id to an identity.
    ///
    /// `None` and blank ids both fall back to the guest.
    pub fn from_session(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => Identity::User(id.to_string()),
            _ => Identity::Guest,
        }
    }

    /// Stable key used to index carts and locks.
    ///
    /// User keys are prefixed so a user literally named "guest" can never
    /// collide with the guest cart.
    pub fn key(&self) -> String {
        match self {
            Identity::Guest => Self::GUEST_KEY.to_string(),
            Identity::User(id) => format!("{}{}", Self::USER_PREFIX, id),
        }
    }

    /// Parses a key produced by [`Identity::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        if key == Self::GUEST_KEY {
            return Some(Identity::Guest);
        }
        key.strip_prefix(Self::USER_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| Identity::User(id.to_string()))
    }

    /// The user id, if signed in.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Guest => None,
            Identity::User(id) => Some(id),
        }
    }

    /// True for the anonymous session.
    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::Guest
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product as seen by the pricing core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier.
    pub id: String,

    /// Display name, frozen into cart lines and order items.
    pub name: String,

    /// List price.
    pub price: Money,

    /// Sale price; wins over `price` when present.
    pub discount_price: Option<Money>,

    /// Units on hand. Live external quantity the cart must not exceed.
    pub stock: i64,
}

impl Product {
    /// The price a buyer pays per unit (`discount_price ?? price`).
    #[inline]
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }

    /// Checks whether `quantity` units fit in the current stock.
    pub fn can_supply(&self, quantity: i64) -> bool {
        quantity <= self.stock
    }
}

// =============================================================================
// Shipping Selection
// =============================================================================

/// How the order leaves the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShippingSelection {
    /// Customer collects in store.
    Pickup,
    /// Courier delivery for a flat fee.
    Delivery,
}

impl Default for ShippingSelection {
    fn default() -> Self {
        ShippingSelection::Pickup
    }
}

// =============================================================================
// Loyalty Tier
// =============================================================================

/// Loyalty rank derived from lifetime-earned Bits.
///
/// Ordering is meaningful: `Base < Mid < Top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Base,
    Mid,
    Top,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Base => f.write_str("BASE"),
            Tier::Mid => f.write_str("MID"),
            Tier::Top => f.write_str("TOP"),
        }
    }
}

// =============================================================================
// Loyalty Account
// =============================================================================

/// A signed-in user's Bits.
///
/// ## Invariants
/// - `lifetime_earned` only ever increases
/// - tier is never stored; call [`LoyaltyAccount::tier`]
/// - `version` increments on every committed change (compare-and-swap)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccount {
    pub user_id: String,
    /// Spendable Bits.
    pub balance: i64,
    /// Total Bits ever credited.
    pub lifetime_earned: i64,
    /// Optimistic concurrency counter.
    pub version: i64,
}

impl LoyaltyAccount {
    /// A fresh account with nothing earned yet.
    pub fn empty(user_id: impl Into<String>) -> Self {
        LoyaltyAccount {
            user_id: user_id.into(),
            balance: 0,
            lifetime_earned: 0,
            version: 0,
        }
    }

    /// Derives the tier from `lifetime_earned`.
    pub fn tier(&self, policy: &LoyaltyPolicy) -> Tier {
        policy.tier_for(self.lifetime_earned)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
