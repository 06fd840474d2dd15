//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `promotion` - Promo codes, discount terms, usages and validation
//! - `referral` - Referral codes, invitations, rewards and statistics
//! - `redemption` - Caller-facing error taxonomy

pub mod foundation;
pub mod promotion;
pub mod redemption;
pub mod referral;
