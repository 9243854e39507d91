//! # Order Settlement
//!
//! Turns an identity's cart into an order, and moves orders through their
//! status machine afterwards.
//!
//! ## Settlement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  settle(identity, selection)                                           │
//! │                                                                         │
//! │  acquire identity lock                                                  │
//! │    │                                                                    │
//! │    ├── cart      = cache or store           (EmptyCart if no lines)     │
//! │    ├── products  = live rows for every line (price + stock refresh)     │
//! │    ├── coupon    = catalog lookup of selection.coupon_code              │
//! │    ├── account   = loyalty account (None for guests)                    │
//! │    │                                                                    │
//! │    ├── quote     = price_checkout(...)      pure, may reject            │
//! │    ├── commit    = SettlementCommit::build(...)                         │
//! │    │                                                                    │
//! │    └── store.commit_settlement(commit)      all-or-nothing              │
//! │          ├── Ok  → evict cart cache, return receipt                     │
//! │          └── Err → nothing written, cart and balance as before          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use bits_core::validation::{validate_order_id, validate_points_request};
use bits_core::{
    price_checkout, Cart, CheckoutQuote, CheckoutSelection, CoreError, Coupon, Identity,
    LoyaltyAccount, Order, OrderStatus, SettlementCommit, SettlementReceipt,
};
use bits_db::{CouponStore, OrderStore, ProductStore, SettlementStore};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::services::loyalty::load_account;
use crate::state::AppState;

/// Inputs to pricing, read fresh for one settlement or quote.
struct Priced {
    cart: Cart,
    account: Option<LoyaltyAccount>,
    quote: CheckoutQuote,
}

#[derive(Debug, Clone)]
pub struct OrderSettlement {
    state: Arc<AppState>,
}

impl OrderSettlement {
    pub fn new(state: Arc<AppState>) -> Self {
        OrderSettlement { state }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// What `settle` would charge right now, without writing anything.
    pub async fn quote(
        &self,
        identity: &Identity,
        selection: &CheckoutSelection,
    ) -> ApiResult<CheckoutQuote> {
        let cart = self.state.read_cart(&identity.key()).await?;
        Ok(self.price(identity, cart, selection).await?.quote)
    }

    /// Settles `identity`'s cart.
    ///
    /// ## Errors
    /// - `EmptyCart`, `CouponRejected`, `RedemptionExceeded` (reject mode),
    ///   negative point request: nothing is written
    /// - `ProductNotFound` if a cart line's product left the catalog
    /// - store failures after retries, including `Conflict` when a loyalty
    ///   write from elsewhere got in first: nothing is written
    pub async fn settle(
        &self,
        identity: &Identity,
        selection: &CheckoutSelection,
    ) -> ApiResult<SettlementReceipt> {
        validate_points_request(selection.points_to_redeem)?;

        let key = identity.key();
        let _guard = self.state.locks().acquire(&key).await;

        let cart = self.state.cart(&key).await?;
        let Priced {
            cart,
            account,
            quote,
        } = self.price(identity, cart, selection).await?;

        let commit = SettlementCommit::build(
            identity,
            &cart,
            &quote,
            account.as_ref(),
            Uuid::new_v4(),
            Utc::now(),
        );

        debug!(
            identity = %key,
            subtotal = %quote.subtotal,
            discount = %quote.discount,
            shipping = %quote.shipping_cost,
            redeemed = quote.points_redeemed,
            earned = quote.points_earned,
            total = %quote.total,
            "Committing settlement"
        );

        if let Err(e) = self
            .state
            .retry("commit_settlement", || {
                self.state.store().commit_settlement(&commit)
            })
            .await
        {
            warn!(identity = %key, error = %e, "Settlement rolled back");
            return Err(e.into());
        }

        self.state.carts().evict(&key).await;

        let policy = self.state.policy();
        let after = commit.loyalty.as_ref().map(|u| u.applied());
        let receipt = SettlementReceipt {
            tier_before: account.as_ref().map(|a| a.tier(policy)),
            tier_after: after.as_ref().map(|a| a.tier(policy)),
            account: after,
            order: commit.order,
        };

        info!(
            identity = %key,
            order_number = %receipt.order.order_number,
            total = %receipt.order.total,
            tier_changed = receipt.tier_changed(),
            "Order settled"
        );
        Ok(receipt)
    }

    /// Reads everything pricing needs and prices `cart`.
    async fn price(
        &self,
        identity: &Identity,
        mut cart: Cart,
        selection: &CheckoutSelection,
    ) -> ApiResult<Priced> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let ids: Vec<String> = cart
            .lines()
            .iter()
            .map(|line| line.product_id().to_string())
            .collect();
        let products = self
            .state
            .retry("get_products", || self.state.store().get_products(&ids))
            .await?;
        for id in &ids {
            let product = products
                .iter()
                .find(|p| &p.id == id)
                .ok_or_else(|| CoreError::ProductNotFound(id.clone()))?;
            cart.refresh_product(product);
        }

        let coupon: Option<Coupon> = match selection.coupon_code.as_deref() {
            Some(code) => {
                self.state
                    .retry("find_coupon", || self.state.store().find_coupon(code))
                    .await?
            }
            None => None,
        };

        let account = load_account(&self.state, identity).await?;

        let quote = price_checkout(
            &cart,
            selection,
            coupon.as_ref(),
            account.as_ref(),
            self.state.policy(),
            self.state.rates(),
        )?;

        Ok(Priced {
            cart,
            account,
            quote,
        })
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Orders placed by `identity`, newest first.
    pub async fn orders_for_identity(&self, identity: &Identity) -> ApiResult<Vec<Order>> {
        let key = identity.key();
        Ok(self
            .state
            .retry("list_orders", || self.state.store().list_orders(&key))
            .await?)
    }

    /// `None` if there is no such order, including ids that are not UUIDs.
    pub async fn order_by_id(&self, order_id: &str) -> ApiResult<Option<Order>> {
        if let Err(e) = validate_order_id(order_id) {
            debug!(order_id = %order_id, error = %e, "Malformed order id");
            return Ok(None);
        }
        Ok(self
            .state
            .retry("get_order", || self.state.store().get_order(order_id))
            .await?)
    }

    /// Moves an order along one edge of the status machine.
    ///
    /// ## Errors
    /// - `OrderNotFound`
    /// - `InvalidStatusTransition` for an edge the machine does not have,
    ///   including any edge out of DELIVERED or CANCELLED
    /// - `Conflict` if the order changed status in the meantime
    pub async fn update_status(&self, order_id: &str, next: OrderStatus) -> ApiResult<Order> {
        let mut order = self
            .order_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let from = order.status;
        order.transition_to(next, Utc::now())?;

        self.state
            .retry("update_order_status", || {
                self.state
                    .store()
                    .update_order_status(order_id, from, next, order.updated_at)
            })
            .await?;

        info!(order_id = %order_id, from = %from, to = %next, "Order status updated");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrySettings, StorefrontConfig};
    use crate::error::ErrorCode;
    use bits_core::{Money, Product, ShippingSelection};
    use bits_db::{CartStore, InjectedFailure, LoyaltyStore, MemoryStore, StoreOp};

    struct Fixture {
        store: Arc<MemoryStore>,
        settlement: OrderSettlement,
        user: Identity,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::with_default_coupons());
        store
            .upsert_product(&Product {
                id: "kb-01".to_string(),
                name: "Teclado".to_string(),
                price: Money::from_units(50_000),
                discount_price: None,
                stock: 5,
            })
            .await
            .unwrap();

        let mut account = LoyaltyAccount::empty("u-1");
        account.balance = 200_000;
        store.save_account(&account).await.unwrap();

        let user = Identity::User("u-1".to_string());
        let mut cart = Cart::new();
        let product = store.get_product("kb-01").await.unwrap().unwrap();
        cart.add_item(&product, 2).unwrap();
        store.save_cart(&user.key(), &cart).await.unwrap();

        let mut config = StorefrontConfig::default();
        config.retry = RetrySettings::immediate(3);
        let state = Arc::new(AppState::new(store.clone(), config));

        Fixture {
            store,
            settlement: OrderSettlement::new(state),
            user,
        }
    }

    #[tokio::test]
    async fn test_quote_matches_settlement() {
        let f = fixture().await;
        let selection = CheckoutSelection::new(ShippingSelection::Pickup)
            .with_coupon("VERANO5000")
            .with_points(100_000);

        let quote = f.settlement.quote(&f.user, &selection).await.unwrap();
        assert_eq!(quote.payable_before_points, Money::from_units(95_000));
        assert_eq!(quote.points_redeemed, 47_500);

        let receipt = f.settlement.settle(&f.user, &selection).await.unwrap();
        assert_eq!(receipt.order.total, quote.total);
        assert_eq!(receipt.order.points_earned, quote.points_earned);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let f = fixture().await;
        let err = f
            .settlement
            .settle(&Identity::Guest, &CheckoutSelection::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);
    }

    #[tokio::test]
    async fn test_negative_points_are_rejected() {
        let f = fixture().await;
        let err = f
            .settlement
            .settle(&f.user, &CheckoutSelection::default().with_points(-1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_conflicting_loyalty_write_aborts_settlement() {
        let f = fixture().await;
        f.store
            .fail_next(StoreOp::SettlementLoyalty, InjectedFailure::Conflict)
            .await;

        let err = f
            .settlement
            .settle(&f.user, &CheckoutSelection::default().with_points(1_000))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(f.store.get_product("kb-01").await.unwrap().unwrap().stock, 5);
        assert_eq!(
            f.store.get_account("u-1").await.unwrap().unwrap().balance,
            200_000
        );
        assert_eq!(
            f.store.load_cart(&f.user.key()).await.unwrap().item_count(),
            2
        );
    }

    #[tokio::test]
    async fn test_status_machine_is_enforced() {
        let f = fixture().await;
        let receipt = f
            .settlement
            .settle(&f.user, &CheckoutSelection::default())
            .await
            .unwrap();
        let id = receipt.order.id.as_str();

        let order = f.settlement.update_status(id, OrderStatus::Paid).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        let err = f
            .settlement
            .update_status(id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessLogic);

        let stored = f.settlement.order_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);

        assert!(f.settlement.order_by_id("abc").await.unwrap().is_none());
        assert!(f.settlement.order_by_id("").await.unwrap().is_none());
        let err = f
            .settlement
            .update_status("abc", OrderStatus::Paid)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let missing = Uuid::new_v4().to_string();
        assert!(f.settlement.order_by_id(&missing).await.unwrap().is_none());
        let err = f
            .settlement
            .update_status(&missing, OrderStatus::Paid)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
