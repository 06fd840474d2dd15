//! PostgreSQL adapters - Database implementations for the store ports.
//!
//! - `PostgresPromoCodeStore` - Promo codes, usages, atomic redemption
//! - `PostgresReferralStore` - Referral codes, invitations, rewards
//! - `PostgresRewardLedger` - Credit balances and course entitlements

mod errors;
mod promo_code_store;
mod referral_store;
mod reward_ledger;

pub use promo_code_store::PostgresPromoCodeStore;
pub use referral_store::PostgresReferralStore;
pub use reward_ledger::PostgresRewardLedger;
