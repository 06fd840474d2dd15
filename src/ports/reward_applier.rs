//! Reward applier port.
//!
//! Delivers a referral reward: credits a balance or grants a course.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::referral::ReferralReward;

/// Applies rewards to the outside world.
///
/// Delivery is at-least-once, so implementations must be idempotent per
/// reward id: applying the same reward twice has the effect of applying it
/// once.
#[async_trait]
pub trait RewardApplier: Send + Sync {
    async fn apply(&self, reward: &ReferralReward) -> Result<(), DomainError>;
}
