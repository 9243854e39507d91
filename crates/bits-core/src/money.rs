//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    95000 * 0.5 * 1.2 drifts once fractions get involved  ❌             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer units + basis points                             │
//! │    Store currency has no minor unit: 100000 = $100.000                  │
//! │    Percentages are basis points: 5000 bps = 50%                         │
//! │    Every "floor" in the pricing rules is integer division               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bits_core::money::Money;
//!
//! let price = Money::from_units(12_990);
//! let line = price * 2;
//! assert_eq!(line.units(), 25_980);
//!
//! // 10% of 10.000, floored
//! assert_eq!(Money::from_units(10_000).percentage_floor(1_000).units(), 1_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in one whole (100%).
pub const BPS_SCALE: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction of discounts and points may dip below
///   zero mid-calculation; callers clamp with [`Money::clamp_non_negative`]
/// - **Single field tuple struct**: serializes as a bare JSON number
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► CartLineItem.unit_price ──► Cart.subtotal            │
/// │                                                    │                    │
/// │                          Coupon discount ◄─────────┤                    │
/// │                                                    ▼                    │
/// │  Shipping fee ──► payable before points ──► − redeemed Bits ──► total   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use bits_core::money::Money;
    ///
    /// let price = Money::from_units(100_000);
    /// assert_eq!(price.units(), 100_000);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the value, or zero if it is negative.
    ///
    /// ## Example
    /// ```rust
    /// use bits_core::money::Money;
    ///
    /// assert_eq!(Money::from_units(-50).clamp_non_negative(), Money::zero());
    /// assert_eq!(Money::from_units(50).clamp_non_negative().units(), 50);
    /// ```
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use bits_core::money::Money;
    ///
    /// let unit_price = Money::from_units(2_990);
    /// assert_eq!(unit_price.multiply_quantity(3).units(), 8_970);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `floor(self * bps / 10000)`, treating negative amounts as zero.
    ///
    /// ## Implementation
    /// i128 intermediate so large subtotals never overflow. Operands are
    /// non-negative, so integer division is exactly `floor`.
    ///
    /// ## Example
    /// ```rust
    /// use bits_core::money::Money;
    ///
    /// // 50% cap on 95.000
    /// assert_eq!(Money::from_units(95_000).percentage_floor(5_000).units(), 47_500);
    /// // 50% of an odd amount floors
    /// assert_eq!(Money::from_units(95_001).percentage_floor(5_000).units(), 47_500);
    /// ```
    pub fn percentage_floor(&self, bps: u32) -> Money {
        let base = self.clamp_non_negative().0 as i128;
        Money((base * bps as i128 / BPS_SCALE as i128) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display renders whole units with `.` thousands separators (`$95.000`).
///
/// ## Note
/// This is for logs and debugging. The views do their own localized
/// formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        write!(f, "{}${}", sign, grouped)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
