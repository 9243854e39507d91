//! # Services
//!
//! What the storefront views call.
//!
//! - [`CartLedger`](cart::CartLedger) - cart per identity, stock-checked
//! - [`CouponResolver`](coupon::CouponResolver) - code lookup and discount
//! - [`LoyaltyLedger`](loyalty::LoyaltyLedger) - Bits balance, tier, caps
//! - [`OrderSettlement`](settlement::OrderSettlement) - checkout and orders

pub mod cart;
pub mod coupon;
pub mod loyalty;
pub mod settlement;

pub use cart::CartLedger;
pub use coupon::CouponResolver;
pub use loyalty::LoyaltyLedger;
pub use settlement::OrderSettlement;
