//! # In-Memory Store
//!
//! A [`Store`](crate::store::Store) held entirely in process memory.
//!
//! Used by the storefront tests and anywhere a throwaway store is handy.
//! It follows the SQLite semantics for everything the services can observe:
//! compare-and-swap loyalty versions, status compare-and-swap, stock floored
//! at zero, and an all-or-nothing settlement commit.
//!
//! ## Settlement Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock ──► staged = state.clone()                                        │
//! │             │                                                           │
//! │             ├── push order                                              │
//! │             ├── decrement stock (floor 0)                               │
//! │             ├── loyalty CAS          ◄── SettlementLoyalty fault point  │
//! │             └── remove cart                                             │
//! │             │                                                           │
//! │        any step fails ──► staged dropped, state untouched               │
//! │        all succeed    ──► state = staged                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Injection
//! `fail_next(op, failure)` queues one failure for the next call of `op`.
//! Queued failures are consumed in order, one per call.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::store::{
    CartStore, CouponStore, LoyaltyStore, OrderStore, ProductStore, SettlementStore,
};
use bits_core::{
    Cart, Coupon, DiscountKind, LoyaltyAccount, Money, Order, OrderStatus, Product,
    SettlementCommit,
};

// =============================================================================
// Failure Injection
// =============================================================================

/// A store call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetProduct,
    GetProducts,
    UpsertProduct,
    LoadCart,
    SaveCart,
    ListCoupons,
    FindCoupon,
    GetAccount,
    SaveAccount,
    GetOrder,
    ListOrders,
    UpdateOrderStatus,
    /// Start of the settlement commit, before anything is staged.
    CommitSettlement,
    /// Inside the settlement commit, after the order and stock are staged.
    SettlementLoyalty,
}

/// What an injected failure looks like to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// `DbError::Busy`, retried by the storefront.
    Transient,
    /// `DbError::QueryFailed`, not retried.
    Permanent,
    /// `DbError::Conflict`, not retried.
    Conflict,
}

impl InjectedFailure {
    fn into_error(self, op: StoreOp) -> DbError {
        match self {
            InjectedFailure::Transient => DbError::Busy(format!("injected at {:?}", op)),
            InjectedFailure::Permanent => DbError::QueryFailed(format!("injected at {:?}", op)),
            InjectedFailure::Conflict => DbError::conflict("Injected", format!("{:?}", op)),
        }
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<String, Product>,
    carts: HashMap<String, Cart>,
    coupons: Vec<Coupon>,
    accounts: HashMap<String, LoyaltyAccount>,
    orders: Vec<Order>,
}

#[derive(Debug, Default)]
struct Inner {
    state: MemoryState,
    failures: HashMap<StoreOp, VecDeque<InjectedFailure>>,
    calls: HashMap<StoreOp, usize>,
}

impl Inner {
    /// Counts the call and pops a queued failure for it, if any.
    fn enter(&mut self, op: StoreOp) -> DbResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;

        let failure = self.failures.get_mut(&op).and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => {
                warn!(op = ?op, failure = ?failure, "Injected store failure");
                Err(failure.into_error(op))
            }
            None => Ok(()),
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Empty store: no products, no coupons.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with [`default_coupons`].
    pub fn with_default_coupons() -> Self {
        Self::with_coupons(default_coupons())
    }

    /// Store preloaded with `coupons`, in catalog order.
    pub fn with_coupons(coupons: Vec<Coupon>) -> Self {
        let inner = Inner {
            state: MemoryState {
                coupons,
                ..MemoryState::default()
            },
            ..Inner::default()
        };
        MemoryStore {
            inner: Mutex::new(inner),
        }
    }

    /// Makes the next call of `op` fail.
    pub async fn fail_next(&self, op: StoreOp, failure: InjectedFailure) {
        let mut inner = self.inner.lock().await;
        inner.failures.entry(op).or_default().push_back(failure);
    }

    /// How many times `op` has been called, failed calls included.
    pub async fn calls(&self, op: StoreOp) -> usize {
        let inner = self.inner.lock().await;
        inner.calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of orders held, across all identities.
    pub async fn order_count(&self) -> usize {
        self.inner.lock().await.state.orders.len()
    }
}

/// The reference coupon catalog, the same rows migration 002 seeds.
pub fn default_coupons() -> Vec<Coupon> {
    vec![
        Coupon {
            code: "VERANO5000".to_string(),
            description: "$5.000 de descuento en compras sobre $30.000".to_string(),
            kind: DiscountKind::Fixed,
            value: 5_000,
            min_purchase: Some(Money::from_units(30_000)),
            active: true,
            usage_limit: None,
            used_count: 0,
        },
        Coupon {
            code: "BIENVENIDA-MD".to_string(),
            description: "10% de descuento en tu primera compra".to_string(),
            kind: DiscountKind::Percentage,
            value: 10,
            min_purchase: None,
            active: true,
            usage_limit: None,
            used_count: 0,
        },
        Coupon {
            code: "BITS20".to_string(),
            description: "20% de descuento sobre $50.000".to_string(),
            kind: DiscountKind::Percentage,
            value: 20,
            min_purchase: Some(Money::from_units(50_000)),
            active: true,
            usage_limit: Some(100),
            used_count: 100,
        },
        Coupon {
            code: "INVIERNO".to_string(),
            description: "$10.000 de descuento (temporada cerrada)".to_string(),
            kind: DiscountKind::Fixed,
            value: 10_000,
            min_purchase: Some(Money::from_units(40_000)),
            active: false,
            usage_limit: None,
            used_count: 0,
        },
    ]
}

// =============================================================================
// Store Implementations
// =============================================================================

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::GetProduct)?;
        Ok(inner.state.products.get(id).cloned())
    }

    async fn get_products(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::GetProducts)?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.state.products.get(id).cloned())
            .collect())
    }

    async fn upsert_product(&self, product: &Product) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::UpsertProduct)?;
        if product.stock < 0 {
            return Err(DbError::QueryFailed(format!(
                "negative stock for product {}",
                product.id
            )));
        }
        inner
            .state
            .products
            .insert(product.id.clone(), product.clone());
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn load_cart(&self, identity_key: &str) -> DbResult<Cart> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::LoadCart)?;
        Ok(inner
            .state
            .carts
            .get(identity_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_cart(&self, identity_key: &str, cart: &Cart) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::SaveCart)?;
        if cart.is_empty() {
            inner.state.carts.remove(identity_key);
        } else {
            inner
                .state
                .carts
                .insert(identity_key.to_string(), cart.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn list_coupons(&self) -> DbResult<Vec<Coupon>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::ListCoupons)?;
        Ok(inner.state.coupons.clone())
    }

    async fn find_coupon(&self, code: &str) -> DbResult<Option<Coupon>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::FindCoupon)?;
        Ok(inner.state.coupons.iter().find(|c| c.matches(code)).cloned())
    }
}

#[async_trait]
impl LoyaltyStore for MemoryStore {
    async fn get_account(&self, user_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::GetAccount)?;
        Ok(inner.state.accounts.get(user_id).cloned())
    }

    async fn save_account(&self, account: &LoyaltyAccount) -> DbResult<LoyaltyAccount> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::SaveAccount)?;
        let stored = swap_account(
            &mut inner.state.accounts,
            &account.user_id,
            account.version,
            account.balance,
            account.lifetime_earned,
        )?;
        Ok(stored)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, id: &str) -> DbResult<Option<Order>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::GetOrder)?;
        Ok(inner.state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, identity_key: &str) -> DbResult<Vec<Order>> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::ListOrders)?;
        let mut orders: Vec<Order> = inner
            .state
            .orders
            .iter()
            .filter(|o| o.identity_key == identity_key)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_number.cmp(&a.order_number))
        });
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::UpdateOrderStatus)?;

        let order = inner
            .state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| DbError::not_found("Order", id))?;
        if order.status != from {
            return Err(DbError::conflict("Order", id));
        }
        order.status = to;
        order.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn commit_settlement(&self, commit: &SettlementCommit) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        inner.enter(StoreOp::CommitSettlement)?;

        let mut staged = inner.state.clone();
        let order = &commit.order;

        if staged.orders.iter().any(|o| o.id == order.id) {
            return Err(DbError::duplicate("order.id", &order.id));
        }
        staged.orders.push(order.clone());

        for line in &commit.stock {
            let product = staged
                .products
                .get_mut(&line.product_id)
                .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;
            product.stock = (product.stock - line.quantity).max(0);
        }

        if let Some(update) = &commit.loyalty {
            inner.enter(StoreOp::SettlementLoyalty)?;
            swap_account(
                &mut staged.accounts,
                &update.user_id,
                update.expected_version,
                update.balance,
                update.lifetime_earned,
            )?;
        }

        staged.carts.remove(&commit.cart_key);

        inner.state = staged;
        debug!(
            order_id = %order.id,
            order_number = %order.order_number,
            "Settlement committed in memory"
        );
        Ok(())
    }
}

/// Compare-and-swap write of a loyalty account. A missing account is version 0.
fn swap_account(
    accounts: &mut HashMap<String, LoyaltyAccount>,
    user_id: &str,
    expected_version: i64,
    balance: i64,
    lifetime_earned: i64,
) -> DbResult<LoyaltyAccount> {
    let current = accounts.get(user_id).map(|a| a.version).unwrap_or(0);
    if current != expected_version {
        return Err(DbError::conflict("LoyaltyAccount", user_id));
    }

    let stored = LoyaltyAccount {
        user_id: user_id.to_string(),
        balance,
        lifetime_earned,
        version: expected_version + 1,
    };
    accounts.insert(user_id.to_string(), stored.clone());
    Ok(stored)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bits_core::{
        price_checkout, CheckoutSelection, Identity, LoyaltyPolicy, ShippingRates,
    };
    use uuid::Uuid;

    fn mouse() -> Product {
        Product {
            id: "ms-01".to_string(),
            name: "Mouse inalámbrico".to_string(),
            price: Money::from_units(20_000),
            discount_price: None,
            stock: 4,
        }
    }

    async fn staged_commit(store: &MemoryStore) -> SettlementCommit {
        store.upsert_product(&mouse()).await.unwrap();
        let mut account = LoyaltyAccount::empty("u-1");
        account.balance = 1_000;
        let account = store.save_account(&account).await.unwrap();

        let identity = Identity::User("u-1".to_string());
        let mut cart = Cart::new();
        cart.add_item(&mouse(), 3).unwrap();
        store.save_cart(&identity.key(), &cart).await.unwrap();

        let quote = price_checkout(
            &cart,
            &CheckoutSelection::default().with_points(500),
            None,
            Some(&account),
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap();
        SettlementCommit::build(&identity, &cart, &quote, Some(&account), Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_default_coupons_match_case_insensitively() {
        let store = MemoryStore::with_default_coupons();
        assert_eq!(store.list_coupons().await.unwrap().len(), 4);
        let found = store.find_coupon("verano5000").await.unwrap().unwrap();
        assert_eq!(found.code, "VERANO5000");
        assert!(store.find_coupon("NADA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::LoadCart, InjectedFailure::Transient).await;
        store.fail_next(StoreOp::LoadCart, InjectedFailure::Permanent).await;

        let first = store.load_cart("guest").await.unwrap_err();
        assert!(first.is_transient());
        let second = store.load_cart("guest").await.unwrap_err();
        assert!(!second.is_transient());
        assert!(store.load_cart("guest").await.unwrap().is_empty());
        assert_eq!(store.calls(StoreOp::LoadCart).await, 3);
    }

    #[tokio::test]
    async fn test_account_save_is_compare_and_swap() {
        let store = MemoryStore::new();
        let stored = store.save_account(&LoyaltyAccount::empty("u-1")).await.unwrap();
        assert_eq!(stored.version, 1);

        let err = store
            .save_account(&LoyaltyAccount::empty("u-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_commit_applies_all_writes() {
        let store = MemoryStore::new();
        let commit = staged_commit(&store).await;

        store.commit_settlement(&commit).await.unwrap();

        assert_eq!(store.get_product("ms-01").await.unwrap().unwrap().stock, 1);
        let account = store.get_account("u-1").await.unwrap().unwrap();
        assert_eq!(account.balance, 1_000 - 500 + commit.order.points_earned);
        assert_eq!(account.version, 2);
        assert!(store.load_cart(&commit.cart_key).await.unwrap().is_empty());
        assert_eq!(store.list_orders(&commit.cart_key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_commit_failure_leaves_state_untouched() {
        let store = MemoryStore::new();
        let commit = staged_commit(&store).await;
        store
            .fail_next(StoreOp::SettlementLoyalty, InjectedFailure::Permanent)
            .await;

        assert!(store.commit_settlement(&commit).await.is_err());

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.get_product("ms-01").await.unwrap().unwrap().stock, 4);
        assert_eq!(store.get_account("u-1").await.unwrap().unwrap().version, 1);
        assert_eq!(store.load_cart(&commit.cart_key).await.unwrap().item_count(), 3);
    }

    #[tokio::test]
    async fn test_status_update_checks_previous_status() {
        let store = MemoryStore::new();
        let commit = staged_commit(&store).await;
        store.commit_settlement(&commit).await.unwrap();
        let id = commit.order.id.as_str();

        store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Paid, Utc::now())
            .await
            .unwrap();
        let err = store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Paid, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let err = store
            .update_order_status("missing", OrderStatus::Pending, OrderStatus::Paid, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
