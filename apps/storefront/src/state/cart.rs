//! # Cart Cache
//!
//! Last persisted cart per identity key.
//!
//! The cache only ever holds carts that were read from, or successfully
//! written to, the store. A failed write leaves the previous entry in place.

use std::collections::HashMap;

use bits_core::Cart;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct CartCache {
    carts: Mutex<HashMap<String, Cart>>,
}

impl CartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the cached cart for `key`.
    pub async fn get(&self, key: &str) -> Option<Cart> {
        self.carts.lock().await.get(key).cloned()
    }

    pub async fn put(&self, key: &str, cart: Cart) {
        self.carts.lock().await.insert(key.to_string(), cart);
    }

    /// Drops the entry so the next read goes to the store.
    pub async fn evict(&self, key: &str) {
        self.carts.lock().await.remove(key);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.carts.lock().await.contains_key(key)
    }
}
