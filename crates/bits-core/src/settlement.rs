//! # Settlement Pricing
//!
//! Turns a cart plus checkout choices into a priced quote, and a quote into
//! the set of writes that must commit together.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. subtotal            = Σ (discount_price ?? price) × qty             │
//! │  2. discount            = coupon.discount_for(subtotal)  (or 0)         │
//! │  3. shipping_cost       = rates.fee_for(selection)                      │
//! │  4. payable_before      = subtotal − discount + shipping_cost           │
//! │  5. redeemed            = resolve(requested, cap on subtotal − discount)│
//! │  6. total               = payable_before − redeemed                     │
//! │  7. earned              = points_earned(subtotal − discount, tier)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Shipping is excluded from both the redemption cap and the earning base.
//!
//! ## Commit Set
//! ```text
//! SettlementCommit
//!   ├── order            insert, status PENDING
//!   ├── stock            stock = max(stock − qty, 0) per line
//!   ├── loyalty          balance − redeemed + earned, lifetime + earned
//!   │                    (only when the version still matches)
//!   └── cart             delete the identity's lines
//! ```
//! The store applies all four or none.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::Cart;
use crate::coupon::{check_coupon, Coupon, CouponRejection, CouponValidation};
use crate::error::{CoreError, CoreResult};
use crate::loyalty::LoyaltyPolicy;
use crate::money::Money;
use crate::order::{generate_order_number, Order, OrderItem, OrderStatus};
use crate::types::{Identity, LoyaltyAccount, ShippingSelection, Tier};

// =============================================================================
// Shipping Rates
// =============================================================================

fn default_pickup_fee() -> i64 {
    0
}

fn default_delivery_fee() -> i64 {
    3_990
}

/// Flat shipping price table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingRates {
    #[serde(default = "default_pickup_fee")]
    pub pickup_fee: i64,
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: i64,
}

impl Default for ShippingRates {
    fn default() -> Self {
        ShippingRates {
            pickup_fee: default_pickup_fee(),
            delivery_fee: default_delivery_fee(),
        }
    }
}

impl ShippingRates {
    pub fn fee_for(&self, selection: ShippingSelection) -> Money {
        match selection {
            ShippingSelection::Pickup => Money::from_units(self.pickup_fee),
            ShippingSelection::Delivery => Money::from_units(self.delivery_fee),
        }
    }
}

// =============================================================================
// Checkout Selection
// =============================================================================

/// What the buyer picked on the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSelection {
    pub shipping: ShippingSelection,
    /// At most one coupon; no stacking.
    pub coupon_code: Option<String>,
    pub points_to_redeem: i64,
}

impl CheckoutSelection {
    pub fn new(shipping: ShippingSelection) -> Self {
        CheckoutSelection {
            shipping,
            ..Default::default()
        }
    }

    /// Applies `code`, replacing any coupon already applied.
    pub fn apply_coupon(&mut self, code: impl Into<String>) {
        self.coupon_code = Some(code.into());
    }

    pub fn remove_coupon(&mut self) -> Option<String> {
        self.coupon_code.take()
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.apply_coupon(code);
        self
    }

    pub fn with_points(mut self, points: i64) -> Self {
        self.points_to_redeem = points;
        self
    }
}

// =============================================================================
// Checkout Quote
// =============================================================================

/// Every number on the checkout summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQuote {
    pub subtotal: Money,
    pub discount: Money,
    /// The catalog spelling of the applied code.
    pub coupon_code: Option<String>,
    pub shipping: ShippingSelection,
    pub shipping_cost: Money,
    /// `subtotal − discount`; base for the redemption cap and for earning.
    pub qualifying_amount: Money,
    pub payable_before_points: Money,
    pub max_redeemable: i64,
    pub points_requested: i64,
    pub points_redeemed: i64,
    pub points_earned: i64,
    pub total: Money,
    /// `None` for guests.
    pub tier: Option<Tier>,
}

/// Prices a checkout.
///
/// ## Arguments
/// - `coupon`: the catalog entry for `selection.coupon_code`, if it exists.
///   It is re-checked against the subtotal here.
/// - `account`: `None` for guests, who redeem and earn nothing.
///
/// ## Errors
/// - Empty cart
/// - Applied coupon missing or no longer valid
/// - Redemption out of bounds (see [`LoyaltyPolicy::resolve_redemption`])
pub fn price_checkout(
    cart: &Cart,
    selection: &CheckoutSelection,
    coupon: Option<&Coupon>,
    account: Option<&LoyaltyAccount>,
    policy: &LoyaltyPolicy,
    rates: &ShippingRates,
) -> CoreResult<CheckoutQuote> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let subtotal = cart.subtotal();

    let applied = match selection.coupon_code.as_deref() {
        None => None,
        Some(code) => {
            let found = coupon.filter(|c| c.matches(code));
            let checked = match found {
                None => CouponValidation::Invalid {
                    reason: CouponRejection::NotFound,
                },
                Some(c) => check_coupon(c, subtotal),
            };
            if let CouponValidation::Invalid { reason } = checked {
                return Err(CoreError::CouponRejected {
                    code: code.to_string(),
                    reason,
                });
            }
            found
        }
    };

    let discount = applied
        .map(|c| c.discount_for(subtotal))
        .unwrap_or_else(Money::zero);
    let qualifying_amount = (subtotal - discount).clamp_non_negative();
    let shipping_cost = rates.fee_for(selection.shipping);
    let payable_before_points = qualifying_amount + shipping_cost;

    let balance = account.map(|a| a.balance).unwrap_or(0);
    let max_redeemable = policy.max_redemption(balance, qualifying_amount);
    let points_redeemed =
        policy.resolve_redemption(balance, qualifying_amount, selection.points_to_redeem)?;

    let tier = account.map(|a| a.tier(policy));
    let points_earned = tier
        .map(|t| policy.points_earned(qualifying_amount, t))
        .unwrap_or(0);

    let total = payable_before_points - Money::from_units(points_redeemed);

    Ok(CheckoutQuote {
        subtotal,
        discount,
        coupon_code: applied.map(|c| c.code.clone()),
        shipping: selection.shipping,
        shipping_cost,
        qualifying_amount,
        payable_before_points,
        max_redeemable,
        points_requested: selection.points_to_redeem,
        points_redeemed,
        points_earned,
        total,
        tier,
    })
}

// =============================================================================
// Commit Set
// =============================================================================

/// One stock write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: String,
    pub quantity: i64,
}

/// New loyalty values, guarded by the version they were computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyUpdate {
    pub user_id: String,
    pub expected_version: i64,
    pub balance: i64,
    pub lifetime_earned: i64,
}

impl LoyaltyUpdate {
    /// The account as it reads after commit.
    pub fn applied(&self) -> LoyaltyAccount {
        LoyaltyAccount {
            user_id: self.user_id.clone(),
            balance: self.balance,
            lifetime_earned: self.lifetime_earned,
            version: self.expected_version + 1,
        }
    }
}

/// Everything settlement writes, staged before any write happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCommit {
    pub order: Order,
    pub stock: Vec<StockDecrement>,
    pub loyalty: Option<LoyaltyUpdate>,
    /// Cart to clear (`Identity::key`).
    pub cart_key: String,
}

impl SettlementCommit {
    /// Stages the commit for `quote`.
    ///
    /// `account` must be the same snapshot the quote was priced from; its
    /// version becomes the compare-and-swap guard.
    pub fn build(
        identity: &Identity,
        cart: &Cart,
        quote: &CheckoutQuote,
        account: Option<&LoyaltyAccount>,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        let items: Vec<OrderItem> = cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                product_id: line.product.id.clone(),
                name_snapshot: line.product.name.clone(),
                unit_price: line.unit_price(),
                quantity: line.quantity,
                line_total: line.line_total(),
            })
            .collect();

        let stock = cart
            .lines()
            .iter()
            .map(|line| StockDecrement {
                product_id: line.product.id.clone(),
                quantity: line.quantity,
            })
            .collect();

        let loyalty = account.map(|a| LoyaltyUpdate {
            user_id: a.user_id.clone(),
            expected_version: a.version,
            balance: a.balance - quote.points_redeemed + quote.points_earned,
            lifetime_earned: a.lifetime_earned + quote.points_earned,
        });

        let order = Order {
            id: id.to_string(),
            order_number: generate_order_number(&id, now),
            identity_key: identity.key(),
            status: OrderStatus::Pending,
            items,
            subtotal: quote.subtotal,
            discount: quote.discount,
            coupon_code: quote.coupon_code.clone(),
            shipping: quote.shipping,
            shipping_cost: quote.shipping_cost,
            total: quote.total,
            points_requested: quote.points_requested,
            points_redeemed: quote.points_redeemed,
            points_earned: quote.points_earned,
            created_at: now,
            updated_at: now,
        };

        SettlementCommit {
            order,
            stock,
            loyalty,
            cart_key: identity.key(),
        }
    }
}

/// What the buyer sees after a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub order: Order,
    /// Account after commit; `None` for guests.
    pub account: Option<LoyaltyAccount>,
    pub tier_before: Option<Tier>,
    pub tier_after: Option<Tier>,
}

impl SettlementReceipt {
    pub fn tier_changed(&self) -> bool {
        self.tier_before != self.tier_after
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::DiscountKind;
    use crate::loyalty::RedemptionMode;
    use crate::types::Product;

    fn product(id: &str, price: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            price: Money::from_units(price),
            discount_price: None,
            stock,
        }
    }

    fn verano() -> Coupon {
        Coupon {
            code: "VERANO5000".to_string(),
            description: "5.000 off over 30.000".to_string(),
            kind: DiscountKind::Fixed,
            value: 5_000,
            min_purchase: Some(Money::from_units(30_000)),
            active: true,
            usage_limit: None,
            used_count: 0,
        }
    }

    fn cart_of_100k() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(&product("p-1", 40_000, 10), 2).unwrap();
        cart.add_item(&product("p-2", 20_000, 10), 1).unwrap();
        cart
    }

    fn account(balance: i64, lifetime: i64) -> LoyaltyAccount {
        LoyaltyAccount {
            user_id: "u-1".to_string(),
            balance,
            lifetime_earned: lifetime,
            version: 3,
        }
    }

    #[test]
    fn test_coupon_and_pickup_quote() {
        let cart = cart_of_100k();
        let selection = CheckoutSelection::new(ShippingSelection::Pickup).with_coupon("verano5000");
        let coupon = verano();
        let acct = account(0, 0);

        let quote = price_checkout(
            &cart,
            &selection,
            Some(&coupon),
            Some(&acct),
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap();

        assert_eq!(quote.subtotal.units(), 100_000);
        assert_eq!(quote.discount.units(), 5_000);
        assert_eq!(quote.shipping_cost, Money::zero());
        assert_eq!(quote.payable_before_points.units(), 95_000);
        assert_eq!(quote.coupon_code.as_deref(), Some("VERANO5000"));
        assert_eq!(quote.points_earned, 950);
        assert_eq!(quote.total.units(), 95_000);
    }

    #[test]
    fn test_redemption_is_capped_and_excludes_shipping() {
        let cart = cart_of_100k();
        let selection = CheckoutSelection::new(ShippingSelection::Delivery)
            .with_coupon("VERANO5000")
            .with_points(200_000);
        let coupon = verano();
        let acct = account(200_000, 0);

        let quote = price_checkout(
            &cart,
            &selection,
            Some(&coupon),
            Some(&acct),
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap();

        assert_eq!(quote.max_redeemable, 47_500);
        assert_eq!(quote.points_redeemed, 47_500);
        assert_eq!(quote.points_requested, 200_000);
        assert_eq!(quote.payable_before_points.units(), 95_000 + 3_990);
        assert_eq!(quote.total.units(), 95_000 + 3_990 - 47_500);
        // Earning ignores both shipping and the points portion.
        assert_eq!(quote.points_earned, 950);
    }

    #[test]
    fn test_reject_mode_refuses_over_redemption() {
        let policy = LoyaltyPolicy {
            redemption_mode: RedemptionMode::Reject,
            ..LoyaltyPolicy::default()
        };
        let selection = CheckoutSelection::default().with_points(60_000);
        let acct = account(200_000, 0);

        let err = price_checkout(
            &cart_of_100k(),
            &selection,
            None,
            Some(&acct),
            &policy,
            &ShippingRates::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::RedemptionExceeded {
                requested: 60_000,
                max: 50_000
            }
        );
    }

    #[test]
    fn test_guest_earns_and_redeems_nothing() {
        let selection = CheckoutSelection::default().with_points(1_000);
        let quote = price_checkout(
            &cart_of_100k(),
            &selection,
            None,
            None,
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap();

        assert_eq!(quote.points_redeemed, 0);
        assert_eq!(quote.points_earned, 0);
        assert_eq!(quote.tier, None);
        assert_eq!(quote.total.units(), 100_000);
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let err = price_checkout(
            &Cart::new(),
            &CheckoutSelection::default(),
            None,
            None,
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap_err();
        assert_eq!(err, CoreError::EmptyCart);
    }

    #[test]
    fn test_applied_coupon_is_revalidated() {
        let mut cart = Cart::new();
        cart.add_item(&product("p-1", 10_000, 10), 1).unwrap();
        let selection = CheckoutSelection::default().with_coupon("VERANO5000");
        let coupon = verano();

        let err = price_checkout(
            &cart,
            &selection,
            Some(&coupon),
            None,
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::CouponRejected {
                code: "VERANO5000".to_string(),
                reason: CouponRejection::BelowMinimum
            }
        );

        let err = price_checkout(
            &cart,
            &selection.clone().with_coupon("NOPE"),
            None,
            None,
            &LoyaltyPolicy::default(),
            &ShippingRates::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::CouponRejected {
                reason: CouponRejection::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_selection_replaces_coupon() {
        let mut selection = CheckoutSelection::default();
        selection.apply_coupon("VERANO5000");
        selection.apply_coupon("BIENVENIDA-MD");
        assert_eq!(selection.coupon_code.as_deref(), Some("BIENVENIDA-MD"));
        assert_eq!(selection.remove_coupon().as_deref(), Some("BIENVENIDA-MD"));
        assert_eq!(selection.coupon_code, None);
    }

    #[test]
    fn test_commit_set_matches_quote() {
        let cart = cart_of_100k();
        let selection = CheckoutSelection::new(ShippingSelection::Pickup)
            .with_coupon("VERANO5000")
            .with_points(10_000);
        let coupon = verano();
        let acct = account(20_000, 4_900);
        let policy = LoyaltyPolicy::default();

        let quote = price_checkout(
            &cart,
            &selection,
            Some(&coupon),
            Some(&acct),
            &policy,
            &ShippingRates::default(),
        )
        .unwrap();
        let identity = Identity::User("u-1".to_string());
        let commit = SettlementCommit::build(
            &identity,
            &cart,
            &quote,
            Some(&acct),
            Uuid::new_v4(),
            Utc::now(),
        );

        assert_eq!(commit.order.status, OrderStatus::Pending);
        assert_eq!(commit.order.items.len(), 2);
        assert_eq!(commit.order.total.units(), 95_000 - 10_000);
        assert_eq!(
            commit.order.total,
            quote.subtotal - quote.discount + quote.shipping_cost
                - Money::from_units(quote.points_redeemed)
        );
        assert_eq!(commit.stock.len(), 2);
        assert_eq!(commit.cart_key, "user:u-1");

        let update = commit.loyalty.unwrap();
        assert_eq!(update.expected_version, 3);
        assert_eq!(update.balance, 20_000 - 10_000 + 950);
        assert_eq!(update.lifetime_earned, 4_900 + 950);

        let after = update.applied();
        assert_eq!(after.version, 4);
        assert_eq!(after.tier(&policy), Tier::Mid);
    }
}
