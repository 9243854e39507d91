//! # Cart Ledger
//!
//! The per-identity cart: line items, stock ceiling, subtotal.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  View Action              Cart Method             Outcome               │
//! │  ───────────              ───────────             ───────               │
//! │                                                                         │
//! │  Click "Add" ────────────► add_item() ──────────► Added / Updated       │
//! │                                            └─────► Err(InsufficientStock)│
//! │                                                                         │
//! │  Change Quantity ────────► update_quantity() ───► Updated / Unchanged   │
//! │                                            └─────► Err(InvalidQuantity) │
//! │                                            └─────► Err(InsufficientStock)│
//! │                                                                         │
//! │  Click Remove ───────────► remove_item() ───────► Removed / Unchanged   │
//! │                                                                         │
//! │  Click Clear ────────────► clear() ─────────────► Cleared / Unchanged   │
//! │                                                                         │
//! │  Rejections never touch the cart.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This type holds ONE identity's cart. Keeping carts apart, picking the
//! active one and persisting it is the storefront's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;

// =============================================================================
// Cart Line Item
// =============================================================================

/// A product reference plus quantity.
///
/// ## Snapshot
/// The product is copied in when the line is added and refreshed on every
/// later add. `product.stock` is the line's known stock ceiling, used by
/// [`Cart::update_quantity`] which has no live product in hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product: Product,

    /// Always >= 1 and <= `product.stock`.
    pub quantity: i64,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLineItem {
    /// Price per unit (`discount_price ?? price`).
    #[inline]
    pub fn unit_price(&self) -> Money {
        self.product.effective_price()
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.id
    }
}

// =============================================================================
// Cart Change
// =============================================================================

/// What a successful cart call did.
///
/// `Unchanged` means "nothing to do" (e.g. removing an absent line); a
/// rejection is an `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CartChange {
    Added,
    Updated,
    Removed,
    Cleared,
    Unchanged,
}

impl CartChange {
    /// True when the cart must be persisted.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, CartChange::Unchanged)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One identity's cart.
///
/// ## Invariants
/// - Lines are unique by product id, in insertion order
/// - Every quantity is in `1..=product.stock`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLineItem>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Rebuilds a cart from stored lines, dropping any that break the
    /// quantity invariants.
    pub fn from_lines(lines: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut cart = Cart::new();
        for line in lines {
            if line.quantity < 1 || line.quantity > line.product.stock {
                continue;
            }
            if cart.line(line.product_id()).is_some() {
                continue;
            }
            cart.lines.push(line);
        }
        cart
    }

    /// Adds `quantity` units of a product.
    ///
    /// ## Behavior
    /// - Existing line: new quantity = existing + `quantity`
    /// - New line: quantity alone
    /// - Result above `product.stock`: rejected, cart untouched
    ///
    /// The line's product snapshot is refreshed from `product`, so a later
    /// `update_quantity` checks against the newest known stock.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<CartChange> {
        if quantity < 1 {
            return Err(CoreError::InvalidQuantity(quantity));
        }

        let in_cart = self.quantity_of(&product.id);
        let new_qty = match in_cart.checked_add(quantity) {
            Some(total) if product.can_supply(total) => total,
            _ => {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    available: product.stock,
                    in_cart,
                    requested: quantity,
                })
            }
        };

        if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product.id) {
            line.quantity = new_qty;
            line.product = product.clone();
            return Ok(CartChange::Updated);
        }

        self.lines.push(CartLineItem {
            product: product.clone(),
            quantity,
            added_at: Utc::now(),
        });
        Ok(CartChange::Added)
    }

    /// Replaces a line's product snapshot with live catalog data.
    ///
    /// Quantity is kept even if the new stock is lower; settlement floors
    /// stock at zero instead of rejecting. Returns false if the product has
    /// no line.
    pub fn refresh_product(&mut self, product: &Product) -> bool {
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.product = product.clone();
                true
            }
            None => false,
        }
    }

    /// Deletes the line for `product_id` if present.
    pub fn remove_item(&mut self, product_id: &str) -> CartChange {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product.id != product_id);

        if self.lines.len() == initial_len {
            CartChange::Unchanged
        } else {
            CartChange::Removed
        }
    }

    /// Overwrites a line's quantity.
    ///
    /// ## Behavior
    /// - `quantity < 1`: rejected
    /// - Product not in cart: rejected
    /// - Above the line's known stock ceiling: rejected
    /// - Same as current: `Unchanged`
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<CartChange> {
        if quantity < 1 {
            return Err(CoreError::InvalidQuantity(quantity));
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product.id == product_id)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))?;

        if quantity > line.product.stock {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available: line.product.stock,
                in_cart: line.quantity,
                requested: quantity,
            });
        }

        if line.quantity == quantity {
            return Ok(CartChange::Unchanged);
        }
        line.quantity = quantity;
        Ok(CartChange::Updated)
    }

    /// Empties the cart.
    pub fn clear(&mut self) -> CartChange {
        if self.lines.is_empty() {
            return CartChange::Unchanged;
        }
        self.lines.clear();
        CartChange::Cleared
    }

    /// Sum of `(discount_price ?? price) * quantity` over all lines.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLineItem::line_total).sum()
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Number of distinct products.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLineItem> {
        self.lines.iter().find(|l| l.product.id == product_id)
    }

    /// Units of `product_id` already in the cart (0 if absent).
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.line(product_id).map(|l| l.quantity).unwrap_or(0)
    }

    /// How many more units of `product` could still be added.
    ///
    /// Lets the view disable "+" before the ledger has to reject.
    pub fn addable_quantity(&self, product: &Product) -> i64 {
        (product.stock - self.quantity_of(&product.id)).max(0)
    }
}

/// Cart summary for the views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub line_count: usize,
    pub item_count: i64,
    pub subtotal: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.line_count(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
