//! # Loyalty Repository
//!
//! Bits balances per signed-in user.
//!
//! ## Versioning
//! ```text
//! read  ──► { balance: 200, lifetime: 900, version: 3 }
//! write ──► UPDATE ... SET version = 4 WHERE user_id = ? AND version = 3
//!              │
//!              ├── 1 row  → committed
//!              └── 0 rows → someone else wrote first → DbError::Conflict
//! ```
//! Settlement does the same check inside its transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bits_core::LoyaltyAccount;

/// A `loyalty_accounts` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LoyaltyRow {
    user_id: String,
    balance: i64,
    lifetime_earned: i64,
    version: i64,
}

impl From<LoyaltyRow> for LoyaltyAccount {
    fn from(row: LoyaltyRow) -> Self {
        LoyaltyAccount {
            user_id: row.user_id,
            balance: row.balance,
            lifetime_earned: row.lifetime_earned,
            version: row.version,
        }
    }
}

/// Repository for loyalty accounts.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    /// Creates a new LoyaltyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Gets the account for `user_id`, if one was ever written.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        debug!(user_id = %user_id, "Fetching loyalty account");

        let row: Option<LoyaltyRow> = sqlx::query_as(
            r#"
            SELECT user_id, balance, lifetime_earned, version
            FROM loyalty_accounts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LoyaltyAccount::from))
    }

    /// Writes `account` if the stored version still equals `account.version`.
    ///
    /// A missing row counts as version 0. Returns the account as stored.
    pub async fn save(&self, account: &LoyaltyAccount) -> DbResult<LoyaltyAccount> {
        debug!(
            user_id = %account.user_id,
            balance = account.balance,
            version = account.version,
            "Saving loyalty account"
        );

        let now = Utc::now();

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
        .bind(&account.user_id)
        .bind(account.balance)
        .bind(account.lifetime_earned)
        .bind(account.version)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("LoyaltyAccount", &account.user_id));
        }

        Ok(LoyaltyAccount {
            version: account.version + 1,
            ..account.clone()
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
