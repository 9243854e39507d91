//! # Error Types
//!
//! Domain-specific error types for bits-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bits-core errors (this file)                                          │
//! │  ├── CoreError        - Rejected mutations and domain failures         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bits-db errors (separate crate)                                       │
//! │  └── DbError          - Persistence failures                           │
//! │                                                                         │
//! │  storefront errors (app)                                               │
//! │  └── ApiError         - What the views see (serialized)                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError ← DbError                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. A rejected mutation is always an `Err`, never a silent no-op
//! 2. Include the numbers the view needs (stock left, redemption cap)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::coupon::CouponRejection;
use crate::order::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The resulting line quantity would exceed the product's stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 3)
    ///      │
    ///      ▼
    /// stock = 2, already in cart = 0
    ///      │
    ///      ▼
    /// InsufficientStock { available: 2, in_cart: 0, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 left"
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, in cart {in_cart}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        in_cart: i64,
        requested: i64,
    },

    /// Quantity must be a positive integer.
    #[error("Invalid quantity {0}: must be at least 1")]
    InvalidQuantity(i64),

    /// The product has no line in the cart.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Checkout was attempted with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The applied coupon does not hold for this order.
    #[error("Coupon {code} rejected: {reason}")]
    CouponRejected {
        code: String,
        reason: CouponRejection,
    },

    /// More Bits were requested than the policy allows for this order.
    #[error("Cannot redeem {requested} Bits: at most {max} allowed")]
    RedemptionExceeded { requested: i64, max: i64 },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The order state machine has no such edge.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Policy or configuration value is inconsistent.
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "prod-1".to_string(),
            available: 2,
            in_cart: 1,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for prod-1: available 2, in cart 1, requested 3"
        );

        let err = CoreError::InvalidStatusTransition {
            order_id: "o-1".to_string(),
            from: OrderStatus::Delivered,
            to: OrderStatus::Paid,
        };
        assert_eq!(err.to_string(), "Order o-1 cannot move from DELIVERED to PAID");
    }

    #[test]
    fn test_coupon_rejection_message() {
        let err = CoreError::CouponRejected {
            code: "VERANO5000".to_string(),
            reason: CouponRejection::BelowMinimum,
        };
        assert_eq!(
            err.to_string(),
            "Coupon VERANO5000 rejected: minimum purchase not reached"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "coupon code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
