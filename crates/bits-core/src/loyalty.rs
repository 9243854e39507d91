//! # Loyalty Ledger (Bits)
//!
//! Point math: earning, tiers and the redemption cap.
//!
//! ## Earning and Spending
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Bits Lifecycle                                       │
//! │                                                                         │
//! │  subtotal − coupon discount  (qualifying amount)                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  floor(q / 100) × tier multiplier ──► earned ──► balance += earned      │
//! │                                                   lifetime += earned    │
//! │                                                        │                │
//! │                                                        ▼                │
//! │                                           tier = tier_for(lifetime)     │
//! │                                                                         │
//! │  Redemption:  redeemed ≤ min(balance, floor(q × 50%))                   │
//! │               balance −= redeemed                                       │
//! │                                                                         │
//! │  Tier thresholds (lifetime earned):                                     │
//! │    0 ─────── 5.000 ──────── 15.000 ──────────►                          │
//! │      BASE ×1.0     MID ×1.2        TOP ×1.5                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every number here comes from [`LoyaltyPolicy`] so the storefront can
//! load it from config. The defaults are the live store's rules.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, BPS_SCALE};
use crate::types::Tier;

// =============================================================================
// Redemption Mode
// =============================================================================

/// What happens when a checkout asks for more Bits than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionMode {
    /// Silently lower the request to the cap.
    #[default]
    Clamp,
    /// Refuse the request with [`CoreError::RedemptionExceeded`].
    Reject,
}

impl std::str::FromStr for RedemptionMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(RedemptionMode::Clamp),
            "reject" => Ok(RedemptionMode::Reject),
            other => Err(ValidationError::InvalidFormat {
                field: "redemption_mode".to_string(),
                reason: format!("expected clamp or reject, got {}", other),
            }),
        }
    }
}

// =============================================================================
// Loyalty Policy
// =============================================================================

fn default_currency_per_point() -> i64 {
    100
}

fn default_base_multiplier_bps() -> u32 {
    10_000
}

fn default_mid_multiplier_bps() -> u32 {
    12_000
}

fn default_top_multiplier_bps() -> u32 {
    15_000
}

fn default_max_redemption_bps() -> u32 {
    5_000
}

fn default_mid_tier_threshold() -> i64 {
    5_000
}

fn default_top_tier_threshold() -> i64 {
    15_000
}

/// The loyalty rules.
///
/// Deserializes from the `[loyalty]` config section; every field has a
/// default so a partial section is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyPolicy {
    /// Currency units of qualifying spend per base point.
    #[serde(default = "default_currency_per_point")]
    pub currency_per_point: i64,

    #[serde(default = "default_base_multiplier_bps")]
    pub base_multiplier_bps: u32,

    #[serde(default = "default_mid_multiplier_bps")]
    pub mid_multiplier_bps: u32,

    #[serde(default = "default_top_multiplier_bps")]
    pub top_multiplier_bps: u32,

    /// Share of the payable amount Bits may cover.
    #[serde(default = "default_max_redemption_bps")]
    pub max_redemption_bps: u32,

    /// Highest lifetime total still in BASE.
    #[serde(default = "default_mid_tier_threshold")]
    pub mid_tier_threshold: i64,

    /// Highest lifetime total still in MID.
    #[serde(default = "default_top_tier_threshold")]
    pub top_tier_threshold: i64,

    #[serde(default)]
    pub redemption_mode: RedemptionMode,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        LoyaltyPolicy {
            currency_per_point: default_currency_per_point(),
            base_multiplier_bps: default_base_multiplier_bps(),
            mid_multiplier_bps: default_mid_multiplier_bps(),
            top_multiplier_bps: default_top_multiplier_bps(),
            max_redemption_bps: default_max_redemption_bps(),
            mid_tier_threshold: default_mid_tier_threshold(),
            top_tier_threshold: default_top_tier_threshold(),
            redemption_mode: RedemptionMode::default(),
        }
    }
}

impl LoyaltyPolicy {
    /// Checks the policy is internally consistent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.currency_per_point <= 0 {
            return Err(ValidationError::InvalidPolicy(
                "currency_per_point must be positive".to_string(),
            ));
        }
        if i64::from(self.max_redemption_bps) > BPS_SCALE {
            return Err(ValidationError::InvalidPolicy(format!(
                "max_redemption_bps must be at most {}",
                BPS_SCALE
            )));
        }
        if self.mid_tier_threshold < 0 || self.mid_tier_threshold > self.top_tier_threshold {
            return Err(ValidationError::InvalidPolicy(
                "tier thresholds must satisfy 0 <= mid <= top".to_string(),
            ));
        }
        if self.base_multiplier_bps > self.mid_multiplier_bps
            || self.mid_multiplier_bps > self.top_multiplier_bps
        {
            return Err(ValidationError::InvalidPolicy(
                "tier multipliers must not decrease from BASE to TOP".to_string(),
            ));
        }
        Ok(())
    }

    /// Derives the tier from a lifetime-earned total.
    ///
    /// Thresholds are inclusive upper bounds: exactly 5.000 is still BASE.
    pub fn tier_for(&self, lifetime_earned: i64) -> Tier {
        if lifetime_earned <= self.mid_tier_threshold {
            Tier::Base
        } else if lifetime_earned <= self.top_tier_threshold {
            Tier::Mid
        } else {
            Tier::Top
        }
    }

    pub fn multiplier_bps(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Base => self.base_multiplier_bps,
            Tier::Mid => self.mid_multiplier_bps,
            Tier::Top => self.top_multiplier_bps,
        }
    }

    /// `floor(floor(qualifying / currency_per_point) × multiplier)`.
    ///
    /// A non-positive qualifying amount earns nothing.
    pub fn points_earned(&self, qualifying: Money, tier: Tier) -> i64 {
        let base_points = qualifying.clamp_non_negative().units() / self.currency_per_point;
        let scaled = i128::from(base_points) * i128::from(self.multiplier_bps(tier))
            / i128::from(BPS_SCALE);
        scaled as i64
    }

    /// `min(balance, floor(payable × max_redemption))`, never negative.
    pub fn max_redemption(&self, balance: i64, payable: Money) -> i64 {
        let cap = payable.percentage_floor(self.max_redemption_bps).units();
        balance.max(0).min(cap)
    }

    /// True iff `requested ≤ balance` and `requested ≤ payable × max_redemption`.
    pub fn validate_redemption(&self, balance: i64, payable: Money, requested: i64) -> bool {
        requested >= 0 && requested <= self.max_redemption(balance, payable)
    }

    /// Turns a requested redemption into the amount actually applied.
    ///
    /// ## Behavior
    /// - Negative request: validation error in both modes
    /// - Within the cap: applied as-is
    /// - Above the cap: lowered to the cap (`Clamp`) or rejected (`Reject`)
    pub fn resolve_redemption(
        &self,
        balance: i64,
        payable: Money,
        requested: i64,
    ) -> CoreResult<i64> {
        if requested < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "points_to_redeem".to_string(),
            }
            .into());
        }

        let max = self.max_redemption(balance, payable);
        if requested <= max {
            return Ok(requested);
        }

        match self.redemption_mode {
            RedemptionMode::Clamp => Ok(max),
            RedemptionMode::Reject => Err(CoreError::RedemptionExceeded { requested, max }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = LoyaltyPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.currency_per_point, 100);
        assert_eq!(policy.max_redemption_bps, 5_000);
    }

    #[test]
    fn test_policy_validation_rejects_inconsistent_values() {
        let mut policy = LoyaltyPolicy::default();
        policy.currency_per_point = 0;
        assert!(policy.validate().is_err());

        let mut policy = LoyaltyPolicy::default();
        policy.max_redemption_bps = 10_001;
        assert!(policy.validate().is_err());

        let mut policy = LoyaltyPolicy::default();
        policy.mid_tier_threshold = 20_000;
        assert!(policy.validate().is_err());

        let mut policy = LoyaltyPolicy::default();
        policy.mid_multiplier_bps = 16_000;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_tier_thresholds_are_inclusive() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.tier_for(0), Tier::Base);
        assert_eq!(policy.tier_for(5_000), Tier::Base);
        assert_eq!(policy.tier_for(5_001), Tier::Mid);
        assert_eq!(policy.tier_for(15_000), Tier::Mid);
        assert_eq!(policy.tier_for(15_001), Tier::Top);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let policy = LoyaltyPolicy::default();
        let mut previous = policy.tier_for(0);
        for lifetime in (0..40_000).step_by(250) {
            let tier = policy.tier_for(lifetime);
            assert!(tier >= previous, "tier dropped at {}", lifetime);
            previous = tier;
        }
    }

    #[test]
    fn test_points_earned_base_tier() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.points_earned(Money::from_units(95_000), Tier::Base), 950);
        assert_eq!(policy.points_earned(Money::from_units(99), Tier::Base), 0);
    }

    #[test]
    fn test_points_earned_floors_after_multiplier() {
        let policy = LoyaltyPolicy::default();
        // floor(9_999 / 100) = 99; 99 × 1.2 = 118.8 → 118
        assert_eq!(policy.points_earned(Money::from_units(9_999), Tier::Mid), 118);
        // 99 × 1.5 = 148.5 → 148
        assert_eq!(policy.points_earned(Money::from_units(9_999), Tier::Top), 148);
        assert_eq!(policy.points_earned(Money::from_units(-500), Tier::Top), 0);
    }

    #[test]
    fn test_max_redemption_caps_at_half() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.max_redemption(200_000, Money::from_units(95_000)), 47_500);
        assert_eq!(policy.max_redemption(1_000, Money::from_units(95_000)), 1_000);
        assert_eq!(policy.max_redemption(1_000, Money::from_units(1)), 0);
        assert_eq!(policy.max_redemption(-5, Money::from_units(10_000)), 0);
    }

    #[test]
    fn test_max_redemption_bounds_hold() {
        let policy = LoyaltyPolicy::default();
        for balance in [0, 1, 999, 47_500, 200_000] {
            for amount in [0, 1, 3, 95_000, 95_001, 1_000_000] {
                let max = policy.max_redemption(balance, Money::from_units(amount));
                assert!(max <= balance);
                assert!(max <= amount / 2);
            }
        }
    }

    #[test]
    fn test_validate_redemption() {
        let policy = LoyaltyPolicy::default();
        let payable = Money::from_units(95_000);
        assert!(policy.validate_redemption(200_000, payable, 47_500));
        assert!(!policy.validate_redemption(200_000, payable, 47_501));
        assert!(!policy.validate_redemption(100, payable, 101));
        assert!(!policy.validate_redemption(100, payable, -1));
    }

    #[test]
    fn test_resolve_redemption_clamps_by_default() {
        let policy = LoyaltyPolicy::default();
        let payable = Money::from_units(95_000);
        assert_eq!(policy.resolve_redemption(200_000, payable, 60_000).unwrap(), 47_500);
        assert_eq!(policy.resolve_redemption(200_000, payable, 10_000).unwrap(), 10_000);
        assert!(matches!(
            policy.resolve_redemption(200_000, payable, -1),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_redemption_reject_mode() {
        let policy = LoyaltyPolicy {
            redemption_mode: RedemptionMode::Reject,
            ..LoyaltyPolicy::default()
        };
        let err = policy
            .resolve_redemption(200_000, Money::from_units(95_000), 60_000)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::RedemptionExceeded {
                requested: 60_000,
                max: 47_500
            }
        );
    }

    #[test]
    fn test_redemption_mode_from_str() {
        assert_eq!("clamp".parse::<RedemptionMode>().unwrap(), RedemptionMode::Clamp);
        assert_eq!(" Reject ".parse::<RedemptionMode>().unwrap(), RedemptionMode::Reject);
        assert!("maybe".parse::<RedemptionMode>().is_err());
    }

    #[test]
    fn test_partial_policy_deserializes_with_defaults() {
        let policy: LoyaltyPolicy =
            serde_json::from_str(r#"{"max_redemption_bps": 3000, "redemption_mode": "reject"}"#)
                .unwrap();
        assert_eq!(policy.max_redemption_bps, 3_000);
        assert_eq!(policy.redemption_mode, RedemptionMode::Reject);
        assert_eq!(policy.currency_per_point, 100);
    }
}
