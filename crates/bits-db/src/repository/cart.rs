//! # Cart Repository
//!
//! Persists one cart per identity key.
//!
//! ## Storage Shape
//! ```text
//! cart_items
//! ┌──────────────┬────────────┬──────────┬──────────────────────┬──────────┐
//! │ identity_key │ product_id │ position │ name/price/stock     │ quantity │
//! ├──────────────┼────────────┼──────────┼──────────────────────┼──────────┤
//! │ guest        │ kb-01      │ 0        │ snapshot at last add │ 1        │
//! │ user:u-42    │ ms-02      │ 0        │ snapshot at last add │ 2        │
//! │ user:u-42    │ kb-01      │ 1        │ snapshot at last add │ 1        │
//! └──────────────┴────────────┴──────────┴──────────────────────┴──────────┘
//! ```
//! A save replaces every row of the identity in one transaction, so a
//! reader never sees half a cart.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bits_core::{Cart, CartLineItem, Money, Product};

/// A `cart_items` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct CartItemRow {
    product_id: String,
    name: String,
    price: i64,
    discount_price: Option<i64>,
    stock: i64,
    quantity: i64,
    added_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartLineItem {
    fn from(row: CartItemRow) -> Self {
        CartLineItem {
            product: Product {
                id: row.product_id,
                name: row.name,
                price: Money::from_units(row.price),
                discount_price: row.discount_price.map(Money::from_units),
                stock: row.stock,
            },
            quantity: row.quantity,
            added_at: row.added_at,
        }
    }
}

/// Repository for cart persistence.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Loads the cart for `identity_key`; empty if none is stored.
    pub async fn load(&self, identity_key: &str) -> DbResult<Cart> {
        let rows: Vec<CartItemRow> = sqlx::query_as(
            r#"
            SELECT product_id, name, price, discount_price, stock, quantity, added_at
            FROM cart_items
            WHERE identity_key = ?1
            ORDER BY position
            "#,
        )
        .bind(identity_key)
        .fetch_all(&self.pool)
        .await?;

        debug!(identity = %identity_key, lines = rows.len(), "Loaded cart");
        Ok(Cart::from_lines(rows.into_iter().map(CartLineItem::from)))
    }

    /// Replaces the stored cart for `identity_key` with `cart`.
    pub async fn save(&self, identity_key: &str, cart: &Cart) -> DbResult<()> {
        debug!(
            identity = %identity_key,
            lines = cart.line_count(),
            items = cart.item_count(),
            "Saving cart"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE identity_key = ?1")
            .bind(identity_key)
            .execute(&mut *tx)
            .await?;

        for (position, line) in cart.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (
                    identity_key, product_id, position,
                    name, price, discount_price, stock,
                    quantity, added_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(identity_key)
            .bind(&line.product.id)
            .bind(position as i64)
            .bind(&line.product.name)
            .bind(line.product.price.units())
            .bind(line.product.discount_price.map(|m| m.units()))
            .bind(line.product.stock)
            .bind(line.quantity)
            .bind(line.added_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes the stored cart for `identity_key`.
    pub async fn delete(&self, identity_key: &str) -> DbResult<()> {
        debug!(identity = %identity_key, "Deleting cart");

        sqlx::query("DELETE FROM cart_items WHERE identity_key = ?1")
            .bind(identity_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            price: Money::from_units(1_000),
            discount_price: None,
            stock,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_keeps_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.carts();

        let mut cart = Cart::new();
        cart.add_item(&product("b", 5), 2).unwrap();
        cart.add_item(&product("a", 5), 1).unwrap();
        repo.save("user:u-1", &cart).await.unwrap();

        let loaded = repo.load("user:u-1").await.unwrap();
        let ids: Vec<&str> = loaded.lines().iter().map(|l| l.product_id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(loaded.item_count(), 3);
    }

    #[tokio::test]
    async fn test_carts_are_isolated_by_identity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.carts();

        let mut cart = Cart::new();
        cart.add_item(&product("a", 5), 1).unwrap();
        repo.save("guest", &cart).await.unwrap();

        assert!(repo.load("user:u-1").await.unwrap().is_empty());

        repo.save("guest", &Cart::new()).await.unwrap();
        assert!(repo.load("guest").await.unwrap().is_empty());
    }
}
