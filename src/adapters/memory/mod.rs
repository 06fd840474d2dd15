//! In-memory adapters for tests and single-process deployments.

mod promo_code_store;
mod referral_store;
mod reward_ledger;

pub use promo_code_store::InMemoryPromoCodeStore;
pub use referral_store::InMemoryReferralStore;
pub use reward_ledger::InMemoryRewardLedger;
