//! # Orders
//!
//! The order record and its status state machine.
//!
//! ## State Machine
//! ```text
//!   PENDING ──► PAID ──► SHIPPED ──► DELIVERED
//!      │          │
//!      └────┬─────┘
//!           ▼
//!       CANCELLED
//!
//!   DELIVERED and CANCELLED are terminal: nothing leaves them.
//! ```
//!
//! An order is created once, at settlement, always `PENDING`. After that
//! the status is the only thing that changes; the line snapshot is frozen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::ShippingSelection;

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The statuses reachable in one step.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown order status {}", s),
            })
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line frozen at settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at time of purchase (frozen).
    pub name_snapshot: String,
    /// Price per unit actually charged (`discount_price ?? price`, frozen).
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

// =============================================================================
// Order
// =============================================================================

/// A settled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// UUID v4.
    pub id: String,
    /// Human-readable `YYYYMMDD-NNNNNN`.
    pub order_number: String,
    /// Key of the identity that placed the order (see `Identity::key`).
    pub identity_key: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub coupon_code: Option<String>,
    pub shipping: ShippingSelection,
    pub shipping_cost: Money,
    /// `subtotal − discount + shipping_cost − points_redeemed`.
    pub total: Money,
    pub points_requested: i64,
    pub points_redeemed: i64,
    pub points_earned: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Moves the order along one edge of the state machine.
    ///
    /// Bumps `updated_at`. Leaves the order untouched on rejection.
    pub fn transition_to(&mut self, next: OrderStatus, at: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                order_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Builds the display number for an order created at `at`.
///
/// ## Format
/// `YYYYMMDD-NNNNNN`, where NNNNNN comes from the low digits of the order
/// UUID. Display only: two orders may share a number, `id` is the key.
pub fn generate_order_number(id: &Uuid, at: DateTime<Utc>) -> String {
    let suffix = id.as_u128() % 1_000_000;
    format!("{}-{:06}", at.format("%Y%m%d"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pending_order() -> Order {
        let now = Utc::now();
        Order {
            id: "o-1".to_string(),
            order_number: "20260101-000001".to_string(),
            identity_key: "user:u-1".to_string(),
            status: OrderStatus::Pending,
            items: vec![OrderItem {
                product_id: "p-1".to_string(),
                name_snapshot: "Teclado".to_string(),
                unit_price: Money::from_units(50_000),
                quantity: 2,
                line_total: Money::from_units(100_000),
            }],
            subtotal: Money::from_units(100_000),
            discount: Money::zero(),
            coupon_code: None,
            shipping: ShippingSelection::Pickup,
            shipping_cost: Money::zero(),
            total: Money::from_units(100_000),
            points_requested: 0,
            points_redeemed: 0,
            points_earned: 1_000,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut order = pending_order();
        let later = Utc::now();
        order.transition_to(OrderStatus::Paid, later).unwrap();
        order.transition_to(OrderStatus::Shipped, later).unwrap();
        order.transition_to(OrderStatus::Delivered, later).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.updated_at, later);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in OrderStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_delivered_then_paid_is_rejected() {
        let mut order = pending_order();
        order.status = OrderStatus::Delivered;
        let before = order.clone();

        let err = order.transition_to(OrderStatus::Paid, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Paid,
                ..
            }
        ));
        assert_eq!(order, before);
    }

    #[test]
    fn test_cancellation_edges() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert_eq!(OrderStatus::Cancelled.to_string(), "CANCELLED");
        assert!("LOST".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&OrderStatus::Shipped).unwrap(),
            r#""SHIPPED""#
        );
    }

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let id = Uuid::from_u128(1_234_567);
        assert_eq!(generate_order_number(&id, at), "20260309-234567");
    }

    #[test]
    fn test_item_count() {
        assert_eq!(pending_order().item_count(), 2);
    }
}
