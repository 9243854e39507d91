//! # bits-core: Pure Pricing and Loyalty Logic for Bits Store
//!
//! This crate holds the storefront's pricing pipeline as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bits Store Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Views (catalog, cart, checkout)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bits-storefront services                     │   │
//! │  │    CartLedger, CouponResolver, LoyaltyLedger, OrderSettlement   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bits-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌────────┐ ┌────────┐ ┌─────────┐ ┌─────────┐ ┌────────────┐ │   │
//! │  │   │  cart  │ │ coupon │ │ loyalty │ │  order  │ │ settlement │ │   │
//! │  │   └────────┘ └────────┘ └─────────┘ └─────────┘ └────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOCKS • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bits-db (Database Layer)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Identity, Product, Tier, LoyaltyAccount
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Cart Ledger math
//! - [`coupon`] - Coupon Resolver
//! - [`loyalty`] - Bits earning, tiers, redemption cap
//! - [`order`] - Order record and status machine
//! - [`settlement`] - Checkout pricing and the commit set
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bits_core::{LoyaltyPolicy, Money, Tier};
//!
//! let policy = LoyaltyPolicy::default();
//!
//! // 1 Bit per 100 spent, BASE multiplier 1×
//! assert_eq!(policy.points_earned(Money::from_units(95_000), Tier::Base), 950);
//!
//! // Bits may cover at most half of the amount
//! assert_eq!(policy.max_redemption(200_000, Money::from_units(95_000)), 47_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod coupon;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod order;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartChange, CartLineItem, CartTotals};
pub use coupon::{Coupon, CouponCatalog, CouponRejection, CouponValidation, DiscountKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use loyalty::{LoyaltyPolicy, RedemptionMode};
pub use money::Money;
pub use order::{Order, OrderItem, OrderStatus};
pub use settlement::{
    price_checkout, CheckoutQuote, CheckoutSelection, LoyaltyUpdate, SettlementCommit,
    SettlementReceipt, ShippingRates, StockDecrement,
};
pub use types::*;
