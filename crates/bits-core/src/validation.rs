//! # Validation Module
//!
//! Input checks run by the storefront services before any ledger call.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Views                                                         │
//! │  └── Disable buttons, show remaining stock                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Storefront services                                           │
//! │  └── THIS MODULE: ids, codes, point requests, catalog rows              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledgers (cart, coupon, loyalty, settlement)                   │
//! │  └── Stock ceiling, coupon rules, redemption cap                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite CHECK / UNIQUE / FOREIGN KEY constraints               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bits_core::validation::{validate_coupon_code, validate_points_request};
//!
//! assert_eq!(validate_coupon_code("  verano5000 ").unwrap(), "verano5000");
//! assert!(validate_points_request(-1).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::Product;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest coupon code accepted.
pub const MAX_COUPON_CODE_LEN: usize = 32;

/// Longest product or user id accepted.
pub const MAX_ID_LEN: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a coupon code typed by the buyer.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 32 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ## Returns
/// The trimmed code. Case is kept; lookup is case-insensitive.
pub fn validate_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "coupon code".to_string(),
        });
    }

    if code.len() > MAX_COUPON_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "coupon code".to_string(),
            max: MAX_COUPON_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "coupon code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code.to_string())
}

/// Validates an opaque identifier (product id, user id).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a requested Bits redemption.
///
/// Zero is fine (no redemption). The upper bound is the loyalty policy's job.
pub fn validate_points_request(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "points_to_redeem".to_string(),
        });
    }
    Ok(())
}

/// Validates a catalog row before it is written.
///
/// ## Rules
/// - id and name present
/// - price, discount price and stock not negative
/// - discount price not above list price
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_id("product id", &product.id)?;

    if product.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if product.price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }

    if let Some(discount) = product.discount_price {
        if discount.is_negative() || discount > product.price {
            return Err(ValidationError::OutOfRange {
                field: "discount_price".to_string(),
                min: 0,
                max: product.price.units(),
            });
        }
    }

    if product.stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "stock".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates an order id (UUID).
///
/// ## Example
/// ```rust
/// use bits_core::validation::validate_order_id;
///
/// assert!(validate_order_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_order_id("not-a-uuid").is_err());
/// ```
pub fn validate_order_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "order id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: "order id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
