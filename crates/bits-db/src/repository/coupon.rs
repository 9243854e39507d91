//! # Coupon Repository
//!
//! Read-only access to the coupon catalog seeded by migration 002.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bits_core::{Coupon, DiscountKind, Money};

/// A `coupons` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CouponRow {
    code: String,
    description: String,
    kind: DiscountKind,
    value: i64,
    min_purchase: Option<i64>,
    active: bool,
    usage_limit: Option<i64>,
    used_count: i64,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            code: row.code,
            description: row.description,
            kind: row.kind,
            value: row.value,
            min_purchase: row.min_purchase.map(Money::from_units),
            active: row.active,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
        }
    }
}

/// Repository for the coupon catalog.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new CouponRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Every coupon, in catalog order.
    pub async fn list_all(&self) -> DbResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> = sqlx::query_as(
            r#"
            SELECT code, description, kind, value, min_purchase, active, usage_limit, used_count
            FROM coupons
            ORDER BY position, code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Listed coupons");
        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    /// Case-insensitive lookup (the column is `COLLATE NOCASE`).
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        debug!(code = %code, "Looking up coupon");

        let row: Option<CouponRow> = sqlx::query_as(
            r#"
            SELECT code, description, kind, value, min_purchase, active, usage_limit, used_count
            FROM coupons
            WHERE code = ?1
            "#,
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use bits_core::{CouponCatalog, CouponRejection, CouponValidation, Money};

    #[tokio::test]
    async fn test_seeded_catalog() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let coupons = db.coupons().list_all().await.unwrap();

        let codes: Vec<&str> = coupons.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["VERANO5000", "BIENVENIDA-MD", "BITS20", "INVIERNO"]);

        let catalog = CouponCatalog::new(coupons);
        assert_eq!(catalog.list_available().len(), 3);
        assert_eq!(
            catalog.validate("INVIERNO", Money::from_units(100_000)),
            CouponValidation::Invalid {
                reason: CouponRejection::Inactive
            }
        );
    }

    #[tokio::test]
    async fn test_find_is_case_insensitive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.coupons();

        let coupon = repo.find_by_code("bienvenida-md").await.unwrap().unwrap();
        assert_eq!(coupon.code, "BIENVENIDA-MD");
        assert_eq!(coupon.value, 10);
        assert!(repo.find_by_code("NOPE").await.unwrap().is_none());
    }
}
