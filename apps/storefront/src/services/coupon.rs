//! # Coupon Resolver
//!
//! Looks codes up in the stored catalog and applies the rules in
//! `bits_core::coupon`. The catalog is read-only here.

use std::sync::Arc;

use bits_core::validation::validate_coupon_code;
use bits_core::{
    Coupon, CouponCatalog, CouponRejection, CouponValidation, Money, ValidationError,
};
use bits_db::CouponStore;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct CouponResolver {
    state: Arc<AppState>,
}

impl CouponResolver {
    pub fn new(state: Arc<AppState>) -> Self {
        CouponResolver { state }
    }

    async fn catalog(&self) -> ApiResult<CouponCatalog> {
        let coupons = self
            .state
            .retry("list_coupons", || self.state.store().list_coupons())
            .await?;
        Ok(CouponCatalog::new(coupons))
    }

    /// Checks `code` for an order of `subtotal`.
    ///
    /// An unknown code is `Invalid { NotFound }`, not an error, and so is a
    /// code no catalog entry could have (too long, stray characters). Only a
    /// blank code is a validation error.
    pub async fn validate(&self, code: &str, subtotal: Money) -> ApiResult<CouponValidation> {
        let code = match validate_coupon_code(code) {
            Ok(code) => code,
            Err(e @ ValidationError::Required { .. }) => return Err(e.into()),
            Err(e) => {
                debug!(code = %code, error = %e, "Malformed coupon code");
                return Ok(CouponValidation::Invalid {
                    reason: CouponRejection::NotFound,
                });
            }
        };
        let result = self.catalog().await?.validate(&code, subtotal);
        debug!(code = %code, subtotal = %subtotal, valid = result.is_valid(), "Coupon checked");
        Ok(result)
    }

    /// Discount `coupon` grants on `subtotal`.
    pub fn calculate_discount(&self, coupon: &Coupon, subtotal: Money) -> Money {
        coupon.discount_for(subtotal)
    }

    /// Active coupons, in catalog order.
    pub async fn list_available(&self) -> ApiResult<Vec<Coupon>> {
        Ok(self.catalog().await?.list_available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;
    use bits_db::MemoryStore;

    fn resolver() -> CouponResolver {
        let store = Arc::new(MemoryStore::with_default_coupons());
        CouponResolver::new(Arc::new(AppState::new(store, StorefrontConfig::default())))
    }

    fn reason(result: CouponValidation) -> Option<CouponRejection> {
        match result {
            CouponValidation::Valid { .. } => None,
            CouponValidation::Invalid { reason } => Some(reason),
        }
    }

    #[tokio::test]
    async fn test_welcome_coupon_takes_ten_percent() {
        let resolver = resolver();
        let subtotal = Money::from_units(10_000);

        let coupon = resolver
            .validate("bienvenida-md", subtotal)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(
            resolver.calculate_discount(&coupon, subtotal),
            Money::from_units(1_000)
        );
    }

    #[tokio::test]
    async fn test_rejection_reasons() {
        let resolver = resolver();
        let big = Money::from_units(100_000);

        assert_eq!(
            reason(resolver.validate("NOPE", big).await.unwrap()),
            Some(CouponRejection::NotFound)
        );
        assert_eq!(
            reason(resolver.validate("INVIERNO", big).await.unwrap()),
            Some(CouponRejection::Inactive)
        );
        assert_eq!(
            reason(resolver.validate("VERANO5000", Money::from_units(29_999)).await.unwrap()),
            Some(CouponRejection::BelowMinimum)
        );
        assert_eq!(
            reason(resolver.validate("BITS20", big).await.unwrap()),
            Some(CouponRejection::UsageExhausted)
        );
        assert_eq!(reason(resolver.validate(" verano5000 ", big).await.unwrap()), None);
    }

    #[tokio::test]
    async fn test_malformed_code_is_not_found() {
        let resolver = resolver();
        let big = Money::from_units(100_000);

        assert_eq!(
            reason(resolver.validate("VERANO 5000", big).await.unwrap()),
            Some(CouponRejection::NotFound)
        );
        assert_eq!(
            reason(resolver.validate("VERANO5000!", big).await.unwrap()),
            Some(CouponRejection::NotFound)
        );
        assert_eq!(
            reason(resolver.validate(&"X".repeat(200), big).await.unwrap()),
            Some(CouponRejection::NotFound)
        );
    }

    #[tokio::test]
    async fn test_blank_code_is_a_validation_error() {
        let err = resolver().validate("   ", Money::zero()).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_list_available_skips_inactive() {
        let codes: Vec<String> = resolver()
            .list_available()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["VERANO5000", "BIENVENIDA-MD", "BITS20"]);
    }
}
