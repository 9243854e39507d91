//! # Settlement Repository
//!
//! The one multi-table write in the system.
//!
//! ## Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    1. INSERT orders + order_items            (status PENDING)           │
//! │    2. UPDATE products SET stock = MAX(stock − qty, 0)   per line        │
//! │         └── product gone           → NotFound  ─┐                       │
//! │    3. UPSERT loyalty_accounts WHERE version = expected                  │
//! │         └── version moved          → Conflict  ─┤                       │
//! │    4. DELETE cart_items WHERE identity_key = ?   │                       │
//! │  COMMIT                                          │                       │
//! │                                                  ▼                       │
//! │                                  ROLLBACK (transaction dropped)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::order::insert_order;
use bits_core::SettlementCommit;

/// Repository for the atomic settlement commit.
#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: SqlitePool,
}

impl SettlementRepository {
    /// Creates a new SettlementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettlementRepository { pool }
    }

    /// Applies every write in `commit`, or none of them.
    pub async fn commit(&self, commit: &SettlementCommit) -> DbResult<()> {
        let order = &commit.order;
        debug!(
            order_id = %order.id,
            identity = %commit.cart_key,
            lines = commit.stock.len(),
            "Beginning settlement transaction"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        insert_order(&mut tx, order).await?;

        for line in &commit.stock {
            let result = sqlx::query(
                r#"
                UPDATE products SET
                    stock = MAX(stock - ?2, 0),
                    updated_at = ?3
                WHERE id = ?1
                "#,
            )
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Product", &line.product_id));
            }
        }

        if let Some(update) = &commit.loyalty {
            let result = sqlx::query(
                r#"
                INSERT INTO loyalty_accounts (user_id, balance, lifetime_earned, version, updated_at)
                VALUES (?1, ?2, ?3, ?4 + 1, ?5)
                ON CONFLICT(user_id) DO UPDATE SET
                    balance = excluded.balance,
                    lifetime_earned = excluded.lifetime_earned,
                    version = loyalty_accounts.version + 1,
                    updated_at = excluded.updated_at
                WHERE loyalty_accounts.version = ?4
                "#,
            )
            .bind(&update.user_id)
            .bind(update.balance)
            .bind(update.lifetime_earned)
            .bind(update.expected_version)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::conflict("LoyaltyAccount", &update.user_id));
            }
        }

        sqlx::query("DELETE FROM cart_items WHERE identity_key = ?1")
            .bind(&commit.cart_key)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Settlement committed"
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
