//! Promotion domain module.
//!
//! Promo codes, their discount terms, redemption facts, and the pure
//! validation and discount rules.
//!
//! # Module Structure
//!
//! - `code` - CodeString value object shared with referral codes
//! - `discount` - DiscountTerms and the discount calculator
//! - `promo_code` - PromoCode entity, UsageLimit, ValidityWindow
//! - `usage` - PromoCodeUsage redemption fact
//! - `validation` - PromoRejection and validate_promo_code

mod code;
mod discount;
pub(crate) mod promo_code;
mod usage;
mod validation;

pub use code::{CodeString, MAX_CODE_LEN, MIN_CODE_LEN};
pub use discount::{compute_discount, DiscountTerms};
pub use promo_code::{PromoCode, UsageLimit, ValidityWindow};
pub use usage::PromoCodeUsage;
pub use validation::{validate_promo_code, PromoRejection, PromoValidation};
