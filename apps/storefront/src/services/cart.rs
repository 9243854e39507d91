//! # Cart Ledger
//!
//! One cart per identity, one active identity per ledger.
//!
//! ## Mutation Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_item / remove_item / update_quantity / clear                      │
//! │                                                                         │
//! │  1. acquire identity lock                                               │
//! │  2. cart = cache[key] or store.load_cart(key)                           │
//! │  3. apply the change to a COPY of the cart                              │
//! │       └── rejected ──► Err(..), nothing written, cache unchanged        │
//! │  4. store.save_cart(key, copy)        (retried while transient)         │
//! │       └── failed ───► Err(..), cache still holds the old cart           │
//! │  5. cache[key] = copy                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A ledger models one browser session. Two sessions for the same identity
//! are two ledgers over the same [`AppState`]; their writes interleave
//! through the identity lock.

use std::sync::Arc;

use bits_core::validation::validate_id;
use bits_core::{Cart, CartChange, CartTotals, CoreError, CoreResult, Identity, Money};
use bits_db::{CartStore, ProductStore};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::state::AppState;

/// Cart operations for the active identity.
#[derive(Debug)]
pub struct CartLedger {
    state: Arc<AppState>,
    active: RwLock<Identity>,
}

impl CartLedger {
    /// A ledger whose active identity is the guest.
    pub fn new(state: Arc<AppState>) -> Self {
        CartLedger {
            state,
            active: RwLock::new(Identity::Guest),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Switches to `identity`'s cart and returns it.
    ///
    /// An identity with nothing stored starts with an empty cart. If the
    /// cart cannot be loaded the active identity stays as it was.
    pub async fn set_active_identity(&self, identity: Identity) -> ApiResult<Cart> {
        let key = identity.key();
        let cart = {
            let _guard = self.state.locks().acquire(&key).await;
            self.state.cart(&key).await?
        };

        info!(identity = %key, "Switching active cart");
        *self.active.write().await = identity;
        Ok(cart)
    }

    pub async fn active_identity(&self) -> Identity {
        self.active.read().await.clone()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `quantity` of a product, merging with an existing line.
    ///
    /// ## Errors
    /// - `ProductNotFound` if the catalog has no such product
    /// - `InvalidQuantity` if `quantity < 1`
    /// - `InsufficientStock` if the line would exceed current stock; the
    ///   error carries what is available and already in the cart
    pub async fn add_item(&self, product_id: &str, quantity: i64) -> ApiResult<CartChange> {
        validate_id("product_id", product_id)?;

        let product = self
            .state
            .retry("get_product", || self.state.store().get_product(product_id))
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        self.mutate("add_item", |cart| cart.add_item(&product, quantity))
            .await
    }

    /// Removes a product's line. `Unchanged` if it was not in the cart.
    pub async fn remove_item(&self, product_id: &str) -> ApiResult<CartChange> {
        self.mutate("remove_item", |cart| Ok(cart.remove_item(product_id)))
            .await
    }

    /// Overwrites a line's quantity.
    ///
    /// ## Errors
    /// - `InvalidQuantity` if `quantity < 1`
    /// - `NotInCart` if there is no line for the product
    /// - `InsufficientStock` if `quantity` exceeds the line's known stock
    pub async fn update_quantity(&self, product_id: &str, quantity: i64) -> ApiResult<CartChange> {
        self.mutate("update_quantity", |cart| {
            cart.update_quantity(product_id, quantity)
        })
        .await
    }

    /// Empties the active cart. Other identities' carts are untouched.
    pub async fn clear(&self) -> ApiResult<CartChange> {
        self.mutate("clear", |cart| Ok(cart.clear())).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The active cart.
    pub async fn cart(&self) -> ApiResult<Cart> {
        let key = self.active_identity().await.key();
        self.state.read_cart(&key).await
    }

    pub async fn subtotal(&self) -> ApiResult<Money> {
        Ok(self.cart().await?.subtotal())
    }

    pub async fn item_count(&self) -> ApiResult<i64> {
        Ok(self.cart().await?.item_count())
    }

    pub async fn totals(&self) -> ApiResult<CartTotals> {
        Ok(CartTotals::from(&self.cart().await?))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Applies `change` to a copy of the active cart and persists it.
    async fn mutate<F>(&self, operation: &'static str, change: F) -> ApiResult<CartChange>
    where
        F: FnOnce(&mut Cart) -> CoreResult<CartChange>,
    {
        let key = self.active_identity().await.key();
        let _guard = self.state.locks().acquire(&key).await;

        let mut cart = self.state.cart(&key).await?;
        let outcome = change(&mut cart)?;

        if outcome.is_mutation() {
            self.state
                .retry("save_cart", || self.state.store().save_cart(&key, &cart))
                .await?;
            debug!(
                identity = %key,
                operation,
                change = ?outcome,
                items = cart.item_count(),
                "Cart saved"
            );
            self.state.carts().put(&key, cart).await;
        }

        Ok(outcome)
    }
}
