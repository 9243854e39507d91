//! # Store Traits
//!
//! The persistence seam the storefront services depend on.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          dyn Store                                      │
//! │     ProductStore + CartStore + CouponStore + LoyaltyStore               │
//! │              + OrderStore + SettlementStore                             │
//! │                                                                         │
//! │   ┌──────────────────────────┐      ┌──────────────────────────┐       │
//! │   │  Database (SQLite)       │      │  MemoryStore             │       │
//! │   │  one repository per      │      │  in-process maps,        │       │
//! │   │  table, real transaction │      │  stage-and-swap commit,  │       │
//! │   │  for settlement          │      │  failure injection       │       │
//! │   └──────────────────────────┘      └──────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any type implementing all six traits is a [`Store`] automatically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbResult;
use crate::pool::Database;
use bits_core::{Cart, Coupon, LoyaltyAccount, Order, OrderStatus, Product, SettlementCommit};

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, id: &str) -> DbResult<Option<Product>>;

    /// Unknown ids are skipped.
    async fn get_products(&self, ids: &[String]) -> DbResult<Vec<Product>>;

    async fn upsert_product(&self, product: &Product) -> DbResult<()>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Empty cart if nothing is stored for the key.
    async fn load_cart(&self, identity_key: &str) -> DbResult<Cart>;

    /// Replaces the stored cart atomically.
    async fn save_cart(&self, identity_key: &str, cart: &Cart) -> DbResult<()>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Every coupon, in catalog order.
    async fn list_coupons(&self) -> DbResult<Vec<Coupon>>;

    /// Case-insensitive.
    async fn find_coupon(&self, code: &str) -> DbResult<Option<Coupon>>;
}

#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    async fn get_account(&self, user_id: &str) -> DbResult<Option<LoyaltyAccount>>;

    /// Compare-and-swap on `account.version`; returns the stored account.
    async fn save_account(&self, account: &LoyaltyAccount) -> DbResult<LoyaltyAccount>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: &str) -> DbResult<Option<Order>>;

    /// Newest first.
    async fn list_orders(&self, identity_key: &str) -> DbResult<Vec<Order>>;

    /// Compare-and-swap on the current status.
    async fn update_order_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()>;
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// All-or-nothing.
    async fn commit_settlement(&self, commit: &SettlementCommit) -> DbResult<()>;
}

/// Everything the storefront needs from persistence.
pub trait Store:
    ProductStore + CartStore + CouponStore + LoyaltyStore + OrderStore + SettlementStore
{
}

impl<T> Store for T where
    T: ProductStore + CartStore + CouponStore + LoyaltyStore + OrderStore + SettlementStore
{
}

// =============================================================================
// SQLite Implementation
// =============================================================================

#[async_trait]
impl ProductStore for Database {
    async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        self.products().get_by_id(id).await
    }

    async fn get_products(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        self.products().get_many(ids).await
    }

    async fn upsert_product(&self, product: &Product) -> DbResult<()> {
        self.products().upsert(product).await
    }
}

#[async_trait]
impl CartStore for Database {
    async fn load_cart(&self, identity_key: &str) -> DbResult<Cart> {
        self.carts().load(identity_key).await
    }

    async fn save_cart(&self, identity_key: &str, cart: &Cart) -> DbResult<()> {
        self.carts().save(identity_key, cart).await
    }
}

#[async_trait]
impl CouponStore for Database {
    async fn list_coupons(&self) -> DbResult<Vec<Coupon>> {
        self.coupons().list_all().await
    }

    async fn find_coupon(&self, code: &str) -> DbResult<Option<Coupon>> {
        self.coupons().find_by_code(code).await
    }
}

#[async_trait]
impl LoyaltyStore for Database {
    async fn get_account(&self, user_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        self.loyalty().get(user_id).await
    }

    async fn save_account(&self, account: &LoyaltyAccount) -> DbResult<LoyaltyAccount> {
        self.loyalty().save(account).await
    }
}

#[async_trait]
impl OrderStore for Database {
    async fn get_order(&self, id: &str) -> DbResult<Option<Order>> {
        self.orders().get_by_id(id).await
    }

    async fn list_orders(&self, identity_key: &str) -> DbResult<Vec<Order>> {
        self.orders().list_for_identity(identity_key).await
    }

    async fn update_order_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        self.orders().update_status(id, from, to, at).await
    }
}

#[async_trait]
impl SettlementStore for Database {
    async fn commit_settlement(&self, commit: &SettlementCommit) -> DbResult<()> {
        self.settlements().commit(commit).await
    }
}
