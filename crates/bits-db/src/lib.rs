//! # bits-db: Persistence for Bits Store
//!
//! SQLite storage for carts, coupons, loyalty accounts and orders, plus the
//! store traits the storefront services are written against.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bits Store Data Flow                             │
//! │                                                                         │
//! │  OrderSettlement::settle("user:u-42")                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bits-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Store traits │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CartRepo      │    │ 001_init.sql │  │   │
//! │  │   │ Database ─────┼───►│ LoyaltyRepo   │    │ 002_seed.sql │  │   │
//! │  │   │ MemoryStore   │    │ SettlementRepo│    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/bits-store/bits.db                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table group
//! - [`store`] - Store traits and their SQLite implementation
//! - [`memory`] - In-process store with failure injection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bits_db::{Database, DbConfig, CartStore};
//!
//! let db = Database::new(DbConfig::new("bits.db")).await?;
//! let cart = db.load_cart("guest").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use memory::{default_coupons, InjectedFailure, MemoryStore, StoreOp};
pub use pool::{Database, DbConfig};
pub use store::{
    CartStore, CouponStore, LoyaltyStore, OrderStore, ProductStore, SettlementStore, Store,
};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::coupon::CouponRepository;
pub use repository::loyalty::LoyaltyRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::settlement::SettlementRepository;
