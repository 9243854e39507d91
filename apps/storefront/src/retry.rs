//! # Store Retry
//!
//! Re-runs a store call while it fails with a transient error.
//!
//! ## Retry Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1 ──► Ok ─────────────────────────────────────────► return     │
//! │      │                                                                  │
//! │      └── Err(e)                                                         │
//! │            ├── permanent (NotFound, Conflict, ...) ────────► return e   │
//! │            ├── attempts == max_attempts ───── error! ──────► return e   │
//! │            └── transient ── warn! ── sleep(next_backoff) ── attempt n+1 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Transient means `DbError::is_transient()`: busy/locked database, pool
//! exhausted, connection failure.

use std::future::Future;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use bits_db::{DbError, DbResult};
use tracing::{error, warn};

use crate::config::RetrySettings;

/// Creates the exponential backoff for one retried call.
fn create_backoff(settings: &RetrySettings) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: settings.initial_backoff(),
        max_interval: settings.max_backoff(),
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Runs `op` up to `settings.max_attempts` times.
pub async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    operation: &'static str,
    mut op: F,
) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = create_backoff(settings);
    let mut attempt: u32 = 1;

    loop {
        let err: DbError = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_transient() {
            return Err(err);
        }

        if attempt >= settings.max_attempts {
            error!(operation, attempts = attempt, error = %err, "Giving up on store call");
            return Err(err);
        }

        let wait = backoff.next_backoff().unwrap_or_else(|| settings.max_backoff());
        warn!(operation, attempt, ?wait, error = %err, "Transient store failure, retrying");
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&RetrySettings::immediate(3), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbError::Busy("locked".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: DbResult<()> = with_retry(&RetrySettings::immediate(2), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::PoolExhausted)
        })
        .await;

        assert!(matches!(result, Err(DbError::PoolExhausted)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: DbResult<()> = with_retry(&RetrySettings::immediate(5), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::conflict("LoyaltyAccount", "u-1"))
        })
        .await;

        assert!(matches!(result, Err(DbError::Conflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
