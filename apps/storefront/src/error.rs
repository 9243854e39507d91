//! # API Error Type
//!
//! Unified error type for the storefront services.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Bits Store                             │
//! │                                                                         │
//! │  View                        Rust Services                              │
//! │  ────                        ─────────────                              │
//! │                                                                         │
//! │  cart.addItem('kb-01', 2)                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Service method                                                  │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Store Error? ──── DbError::Busy (after retries) ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Rule Error? ──── CoreError::InsufficientStock ── ApiError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "INSUFFICIENT_STOCK", "message": "Only 2 left of kb-01" }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The view decides how to render each code; services never produce
//! display text beyond the message.

use bits_core::{CoreError, ValidationError};
use bits_db::DbError;
use serde::Serialize;
use ts_rs::TS;

/// Error returned from every storefront service call.
///
/// ## Serialization
/// ```json
/// {
///   "code": "COUPON_REJECTED",
///   "message": "Coupon BITS20 rejected: coupon usage limit reached"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Database operation failed
    DatabaseError,

    /// Database still busy after the last retry
    Unavailable,

    /// Concurrent write won; reload and try again
    Conflict,

    /// Business rule refused the operation
    BusinessLogic,

    /// Cart operation failed
    CartError,

    /// Insufficient stock
    InsufficientStock,

    /// Coupon does not apply
    CouponRejected,

    /// Bits request above the allowed maximum
    RedemptionExceeded,

    /// Internal error
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Creates a cart error.
    pub fn cart(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::CartError, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::Conflict { entity, id } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} {} was changed by another request", entity, id),
            ),
            DbError::Busy(_) | DbError::PoolExhausted => {
                ApiError::new(ErrorCode::Unavailable, "Database is busy, try again")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::Unavailable, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::Serialization(e) => {
                tracing::error!("Stored row could not be decoded: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Stored data is unreadable")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::OrderNotFound(id) => ApiError::not_found("Order", &id),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::InvalidQuantity(_) => ApiError::validation(message),
            CoreError::NotInCart(_) | CoreError::EmptyCart => ApiError::cart(message),
            CoreError::CouponRejected { .. } => ApiError::new(ErrorCode::CouponRejected, message),
            CoreError::RedemptionExceeded { .. } => {
                ApiError::new(ErrorCode::RedemptionExceeded, message)
            }
            CoreError::InvalidStatusTransition { .. } => {
                ApiError::new(ErrorCode::BusinessLogic, message)
            }
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for storefront services.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bits_core::CouponRejection;

    #[test]
    fn test_core_errors_map_to_codes() {
        let err: ApiError = CoreError::CouponRejected {
            code: "BITS20".to_string(),
            reason: CouponRejection::UsageExhausted,
        }
        .into();
        assert_eq!(err.code, ErrorCode::CouponRejected);
        assert!(err.message.contains("usage limit"));

        let err: ApiError = CoreError::EmptyCart.into();
        assert_eq!(err.code, ErrorCode::CartError);

        let err: ApiError = CoreError::ProductNotFound("kb-01".to_string()).into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_transient_db_errors_are_unavailable() {
        let err: ApiError = DbError::Busy("database is locked".to_string()).into();
        assert_eq!(err.code, ErrorCode::Unavailable);

        let err: ApiError = DbError::conflict("LoyaltyAccount", "u-1").into();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[test]
    fn test_serializes_screaming_code() {
        let err = ApiError::cart("Cart is empty");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"code":"CART_ERROR","message":"Cart is empty"}"#);
    }
}
