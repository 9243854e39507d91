//! # State Module
//!
//! Shared state behind every storefront service.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  CartLedger   CouponResolver   LoyaltyLedger   OrderSettlement          │
//! │       │              │               │                │                 │
//! │       └──────────────┴───────┬───────┴────────────────┘                 │
//! │                              ▼                                          │
//! │                      Arc<AppState>                                      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌────────────┐  │
//! │  │ Arc<dyn      │  │ IdentityLocks│  │  CartCache   │  │ Storefront │  │
//! │  │   Store>     │  │ per-identity │  │  last saved  │  │ Config     │  │
//! │  │              │  │ Mutex<()>    │  │  cart by key │  │ (read-only)│  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └────────────┘  │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • Store: implementations are Send + Sync (pool or internal Mutex)     │
//! │  • IdentityLocks: writers for one identity run one at a time           │
//! │  • CartCache: tokio Mutex, updated only after a successful save        │
//! │  • Config: read-only after initialization                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;
mod locks;

pub use cart::CartCache;
pub use locks::IdentityLocks;

use std::future::Future;
use std::sync::Arc;

use bits_core::{Cart, LoyaltyPolicy, ShippingRates};
use bits_db::{CartStore, DbResult, Store};

use crate::config::StorefrontConfig;
use crate::error::ApiResult;
use crate::retry::with_retry;

/// Everything the services share.
pub struct AppState {
    store: Arc<dyn Store>,
    locks: IdentityLocks,
    carts: CartCache,
    config: StorefrontConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: StorefrontConfig) -> Self {
        AppState {
            store,
            locks: IdentityLocks::new(),
            carts: CartCache::new(),
            config,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn locks(&self) -> &IdentityLocks {
        &self.locks
    }

    pub fn carts(&self) -> &CartCache {
        &self.carts
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn policy(&self) -> &LoyaltyPolicy {
        &self.config.loyalty
    }

    pub fn rates(&self) -> &ShippingRates {
        &self.config.shipping
    }

    /// Runs a store call under the configured retry policy.
    pub async fn retry<T, F, Fut>(&self, operation: &'static str, op: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        with_retry(&self.config.retry, operation, op).await
    }

    /// The current cart for `key`: cached copy, else loaded from the store
    /// and cached. Callers must hold the identity lock for `key`.
    pub async fn cart(&self, key: &str) -> ApiResult<Cart> {
        if let Some(cart) = self.carts.get(key).await {
            return Ok(cart);
        }

        let cart = self.retry("load_cart", || self.store.load_cart(key)).await?;
        self.carts.put(key, cart.clone()).await;
        Ok(cart)
    }

    /// Like [`AppState::cart`] without touching the cache on a miss.
    /// Safe without the identity lock.
    pub async fn read_cart(&self, key: &str) -> ApiResult<Cart> {
        match self.carts.get(key).await {
            Some(cart) => Ok(cart),
            None => Ok(self.retry("load_cart", || self.store.load_cart(key)).await?),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
