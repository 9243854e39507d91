//! # Repository Module
//!
//! Database repository implementations for Bits Store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Storefront service                                                     │
//! │       │                                                                 │
//! │       │  store.load_cart("user:u-42")                                   │
//! │       ▼                                                                 │
//! │  Store traits (store.rs)  ──── implemented by ────►  Database           │
//! │       │                                              MemoryStore        │
//! │       ▼                                                                 │
//! │  CartRepository / OrderRepository / ...                                 │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog reads and upserts
//! - [`CartRepository`](cart::CartRepository) - One cart per identity key
//! - [`CouponRepository`](coupon::CouponRepository) - Read-only coupon catalog
//! - [`LoyaltyRepository`](loyalty::LoyaltyRepository) - Versioned Bits balances
//! - [`OrderRepository`](order::OrderRepository) - Order reads and status changes
//! - [`SettlementRepository`](settlement::SettlementRepository) - Atomic settlement

pub mod cart;
pub mod coupon;
pub mod loyalty;
pub mod order;
pub mod product;
pub mod settlement;
