//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `Clock` - Current time
//! - `PromoCodeStore` - Promo codes, usages and the atomic redemption unit
//! - `ReferralStore` - Referral codes, invitations, rewards and the atomic
//!   conversion unit
//! - `RewardApplier` - Idempotent reward delivery

mod clock;
mod promo_code_store;
mod referral_store;
mod reward_applier;

pub use clock::Clock;
pub use promo_code_store::{PromoCodeStore, RedeemOutcome, RedemptionRequest};
pub use referral_store::{ConversionOutcome, ConversionRequest, ReferralStore};
pub use reward_applier::RewardApplier;
