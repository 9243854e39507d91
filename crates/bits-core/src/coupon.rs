//! # Coupon Resolver
//!
//! Coupon rules and discount math over a read-only catalog.
//!
//! ## Validation Order
//! ```text
//! validate(code, subtotal)
//!      │
//!      ├── no such code (case-insensitive) ──► Invalid { NotFound }
//!      ├── active = false ──────────────────► Invalid { Inactive }
//!      ├── subtotal < min_purchase ─────────► Invalid { BelowMinimum }
//!      ├── used_count >= usage_limit ───────► Invalid { UsageExhausted }
//!      └── otherwise ───────────────────────► Valid { coupon }
//! ```
//! The first failing check wins; later checks are not evaluated.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Discount Kind
// =============================================================================

/// How `Coupon::value` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is a whole percentage of the subtotal.
    Percentage,
    /// `value` is a currency amount.
    Fixed,
}

// =============================================================================
// Coupon
// =============================================================================

/// A catalog coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Unique, matched case-insensitively.
    pub code: String,
    pub description: String,
    pub kind: DiscountKind,
    /// Percent for `Percentage`, currency units for `Fixed`.
    pub value: i64,
    pub min_purchase: Option<Money>,
    pub active: bool,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
}

impl Coupon {
    /// Case-insensitive code match.
    pub fn matches(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code.trim())
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.used_count >= limit)
            .unwrap_or(false)
    }

    /// Discount this coupon grants on `subtotal`.
    ///
    /// ## Rules
    /// - Percentage: `floor(subtotal × value / 100)`, at most the subtotal
    /// - Fixed: `min(value, subtotal)`
    /// - Never negative
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let subtotal = subtotal.clamp_non_negative();
        let discount = match self.kind {
            DiscountKind::Percentage => {
                let bps = self.value.clamp(0, 100) as u32 * 100;
                subtotal.percentage_floor(bps)
            }
            DiscountKind::Fixed => Money::from_units(self.value.max(0)),
        };
        discount.min(subtotal)
    }
}

// =============================================================================
// Validation Result
// =============================================================================

/// Why a coupon does not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    NotFound,
    Inactive,
    BelowMinimum,
    UsageExhausted,
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CouponRejection::NotFound => "coupon does not exist",
            CouponRejection::Inactive => "coupon is no longer active",
            CouponRejection::BelowMinimum => "minimum purchase not reached",
            CouponRejection::UsageExhausted => "coupon usage limit reached",
        };
        f.write_str(msg)
    }
}

/// Outcome of [`CouponCatalog::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CouponValidation {
    Valid { coupon: Coupon },
    Invalid { reason: CouponRejection },
}

impl CouponValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, CouponValidation::Valid { .. })
    }

    /// Converts to a `Result`, for callers that want `?`.
    pub fn into_result(self) -> Result<Coupon, CouponRejection> {
        match self {
            CouponValidation::Valid { coupon } => Ok(coupon),
            CouponValidation::Invalid { reason } => Err(reason),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// The coupon catalog, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponCatalog {
    coupons: Vec<Coupon>,
}

impl CouponCatalog {
    pub fn new(coupons: Vec<Coupon>) -> Self {
        CouponCatalog { coupons }
    }

    pub fn find(&self, code: &str) -> Option<&Coupon> {
        self.coupons.iter().find(|c| c.matches(code))
    }

    /// Checks `code` against `subtotal`; see the module docs for the order.
    pub fn validate(&self, code: &str, subtotal: Money) -> CouponValidation {
        let Some(coupon) = self.find(code) else {
            return CouponValidation::Invalid {
                reason: CouponRejection::NotFound,
            };
        };
        check_coupon(coupon, subtotal)
    }

    pub fn calculate_discount(&self, coupon: &Coupon, subtotal: Money) -> Money {
        coupon.discount_for(subtotal)
    }

    /// Active coupons, in catalog order.
    pub fn list_available(&self) -> Vec<Coupon> {
        self.coupons.iter().filter(|c| c.active).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}

/// Runs the active → minimum → usage checks on an already found coupon.
pub fn check_coupon(coupon: &Coupon, subtotal: Money) -> CouponValidation {
    let reason = if !coupon.active {
        Some(CouponRejection::Inactive)
    } else if coupon.min_purchase.is_some_and(|min| subtotal < min) {
        Some(CouponRejection::BelowMinimum)
    } else if coupon.is_exhausted() {
        Some(CouponRejection::UsageExhausted)
    } else {
        None
    };

    match reason {
        Some(reason) => CouponValidation::Invalid { reason },
        None => CouponValidation::Valid {
            coupon: coupon.clone(),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(code: &str, kind: DiscountKind, value: i64) -> Coupon {
        Coupon {
            code: code.to_string(),
            description: String::new(),
            kind,
            value,
            min_purchase: None,
            active: true,
            usage_limit: None,
            used_count: 0,
        }
    }

    fn catalog() -> CouponCatalog {
        let verano = Coupon {
            min_purchase: Some(Money::from_units(30_000)),
            ..coupon("VERANO5000", DiscountKind::Fixed, 5_000)
        };
        let bienvenida = coupon("BIENVENIDA-MD", DiscountKind::Percentage, 10);
        let agotado = Coupon {
            usage_limit: Some(100),
            used_count: 100,
            min_purchase: Some(Money::from_units(50_000)),
            ..coupon("BITS20", DiscountKind::Percentage, 20)
        };
        let invierno = Coupon {
            active: false,
            min_purchase: Some(Money::from_units(1_000_000)),
            ..coupon("INVIERNO", DiscountKind::Fixed, 10_000)
        };
        CouponCatalog::new(vec![verano, bienvenida, agotado, invierno])
    }

    #[test]
    fn test_percentage_coupon_discount() {
        let catalog = catalog();
        let result = catalog.validate("BIENVENIDA-MD", Money::from_units(10_000));
        let coupon = result.into_result().unwrap();
        assert_eq!(
            catalog.calculate_discount(&coupon, Money::from_units(10_000)).units(),
            1_000
        );
    }

    #[test]
    fn test_fixed_coupon_discount_capped_at_subtotal() {
        let c = coupon("X", DiscountKind::Fixed, 5_000);
        assert_eq!(c.discount_for(Money::from_units(100_000)).units(), 5_000);
        assert_eq!(c.discount_for(Money::from_units(3_000)).units(), 3_000);
        assert_eq!(c.discount_for(Money::zero()), Money::zero());
    }

    #[test]
    fn test_percentage_floors_and_never_exceeds_subtotal() {
        let c = coupon("X", DiscountKind::Percentage, 10);
        assert_eq!(c.discount_for(Money::from_units(9_999)).units(), 999);

        let silly = coupon("Y", DiscountKind::Percentage, 250);
        assert_eq!(silly.discount_for(Money::from_units(500)).units(), 500);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = catalog();
        assert!(catalog
            .validate("verano5000", Money::from_units(100_000))
            .is_valid());
        assert!(catalog
            .validate("  Bienvenida-md ", Money::from_units(1))
            .is_valid());
    }

    #[test]
    fn test_rejection_reasons() {
        let catalog = catalog();
        assert_eq!(
            catalog.validate("NOPE", Money::from_units(100_000)),
            CouponValidation::Invalid {
                reason: CouponRejection::NotFound
            }
        );
        assert_eq!(
            catalog.validate("VERANO5000", Money::from_units(29_999)),
            CouponValidation::Invalid {
                reason: CouponRejection::BelowMinimum
            }
        );
        assert_eq!(
            catalog.validate("BITS20", Money::from_units(60_000)),
            CouponValidation::Invalid {
                reason: CouponRejection::UsageExhausted
            }
        );
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        let catalog = catalog();
        // Inactive and below minimum: inactive wins.
        assert_eq!(
            catalog.validate("INVIERNO", Money::from_units(10)),
            CouponValidation::Invalid {
                reason: CouponRejection::Inactive
            }
        );
        // Below minimum and exhausted: minimum wins.
        assert_eq!(
            catalog.validate("BITS20", Money::from_units(10)),
            CouponValidation::Invalid {
                reason: CouponRejection::BelowMinimum
            }
        );
    }

    #[test]
    fn test_list_available_keeps_catalog_order() {
        let codes: Vec<String> = catalog()
            .list_available()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["VERANO5000", "BIENVENIDA-MD", "BITS20"]);
    }

    #[test]
    fn test_validation_serialization() {
        let json = serde_json::to_string(&CouponValidation::Invalid {
            reason: CouponRejection::BelowMinimum,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"invalid","reason":"below_minimum"}"#);
    }
}
