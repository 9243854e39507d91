//! # Order Repository
//!
//! Reads orders and moves them through the status machine.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE (SettlementRepository, inside the settlement transaction)    │
//! │     └── orders + order_items rows, status PENDING                       │
//! │                                                                         │
//! │  2. READ                                                                │
//! │     └── get_by_id(), list_for_identity()                                │
//! │                                                                         │
//! │  3. TRANSITION                                                          │
//! │     └── update_status(id, from, to)                                     │
//! │         WHERE status = from  (compare-and-swap)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Edge legality is checked by `Order::transition_to` before this runs;
//! the repository only guarantees nobody moved the order in between.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bits_core::{Money, Order, OrderItem, OrderStatus, ShippingSelection};

// =============================================================================
// Row Mapping
// =============================================================================

/// An `orders` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    identity_key: String,
    status: OrderStatus,
    subtotal: i64,
    discount: i64,
    coupon_code: Option<String>,
    shipping: ShippingSelection,
    shipping_cost: i64,
    total: i64,
    points_requested: i64,
    points_redeemed: i64,
    points_earned: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            identity_key: self.identity_key,
            status: self.status,
            items,
            subtotal: Money::from_units(self.subtotal),
            discount: Money::from_units(self.discount),
            coupon_code: self.coupon_code,
            shipping: self.shipping,
            shipping_cost: Money::from_units(self.shipping_cost),
            total: Money::from_units(self.total),
            points_requested: self.points_requested,
            points_redeemed: self.points_redeemed,
            points_earned: self.points_earned,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// An `order_items` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderItemRow {
    product_id: String,
    name_snapshot: String,
    unit_price: i64,
    quantity: i64,
    line_total: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            unit_price: Money::from_units(row.unit_price),
            quantity: row.quantity,
            line_total: Money::from_units(row.line_total),
        }
    }
}

const ORDER_COLUMNS: &str = r#"
    id, order_number, identity_key, status,
    subtotal, discount, coupon_code, shipping, shipping_cost, total,
    points_requested, points_redeemed, points_earned,
    created_at, updated_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        debug!(id = %id, "Fetching order");

        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.get_items(&row.id).await?;
                Ok(Some(row.into_order(items)))
            }
            None => Ok(None),
        }
    }

    /// Every order placed by `identity_key`, newest first.
    pub async fn list_for_identity(&self, identity_key: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE identity_key = ?1 ORDER BY created_at DESC, order_number DESC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(identity_key)
            .fetch_all(&self.pool)
            .await?;

        debug!(identity = %identity_key, count = rows.len(), "Listed orders");

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.get_items(&row.id).await?;
            orders.push(row.into_order(items));
        }
        Ok(orders)
    }

    /// Gets all items for an order, in cart order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT product_id, name_snapshot, unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    /// Moves an order from `from` to `to` if it is still in `from`.
    ///
    /// ## Errors
    /// - `NotFound` if there is no such order
    /// - `Conflict` if the order is no longer in `from`
    pub async fn update_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, from = %from, to = %to, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?3,
                updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            return Err(if exists == 0 {
                DbError::not_found("Order", id)
            } else {
                DbError::conflict("Order", id)
            });
        }

        Ok(())
    }
}

/// Inserts an order and its items inside an open transaction.
pub(crate) async fn insert_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, identity_key, status,
            subtotal, discount, coupon_code, shipping, shipping_cost, total,
            points_requested, points_redeemed, points_earned,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13,
            ?14, ?15
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(&order.identity_key)
    .bind(order.status)
    .bind(order.subtotal.units())
    .bind(order.discount.units())
    .bind(&order.coupon_code)
    .bind(order.shipping)
    .bind(order.shipping_cost.units())
    .bind(order.total.units())
    .bind(order.points_requested)
    .bind(order.points_redeemed)
    .bind(order.points_earned)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, position, product_id, name_snapshot,
                unit_price, quantity, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order.id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(item.unit_price.units())
        .bind(item.quantity)
        .bind(item.line_total.units())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
