//! # Product Repository
//!
//! Database operations for catalog products.
//!
//! ## What The Storefront Needs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart add        ──► get_by_id()        live price + stock              │
//! │  Settlement      ──► get_many()         refresh every cart line         │
//! │  Settlement      ──► (stock decrement runs in SettlementRepository)     │
//! │  Seed / admin    ──► upsert(), count()                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bits_core::{Money, Product};

// =============================================================================
// Row Mapping
// =============================================================================

/// A `products` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub stock: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price: Money::from_units(row.price),
            discount_price: row.discount_price.map(Money::from_units),
            stock: row.stock,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.get_by_id("kb-01").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        debug!(id = %id, "Fetching product");

        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, price, discount_price, stock
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Gets several products at once. Unknown ids are skipped.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        debug!(count = ids.len(), "Fetching products");

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, price, discount_price, stock FROM products WHERE id IN ({})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, ProductRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Lists the whole catalog, by name.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, price, discount_price, stock
            FROM products
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Listed products");
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Inserts a product or overwrites the one with the same id.
    pub async fn upsert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, stock = product.stock, "Upserting product");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, discount_price, stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                discount_price = excluded.discount_price,
                stock = excluded.stock,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price.units())
        .bind(product.discount_price.map(|m| m.units()))
        .bind(product.stock)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
