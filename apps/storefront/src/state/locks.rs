//! # Identity Locks
//!
//! One async mutex per identity key.
//!
//! ```text
//! tab A: add_item("user:u-1") ──► acquire("user:u-1") ──► load ► mutate ► save
//! tab B: add_item("user:u-1") ──► acquire("user:u-1") ── waits ─────────────►
//! tab C: add_item("guest")    ──► acquire("guest")    ──► runs in parallel
//! ```
//! Locks are created on first use and kept for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Serializes writers for the same identity.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.to_string()).or_default().clone()
        };
        trace!(identity = %key, "Acquiring identity lock");
        lock.lock_owned().await
    }

    /// Number of identities seen so far.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_identity_is_exclusive() {
        let locks = IdentityLocks::new();
        let guard = locks.acquire("user:u-1").await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire("user:u-1")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire("user:u-1")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_identities_do_not_block() {
        let locks = IdentityLocks::new();
        let _a = locks.acquire("user:u-1").await;

        let other = tokio::time::timeout(Duration::from_millis(20), locks.acquire("guest")).await;
        assert!(other.is_ok());
        assert_eq!(locks.len().await, 2);
    }
}
