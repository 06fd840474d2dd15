//! In-memory RewardApplier.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use crate::domain::foundation::{CourseId, DomainError, ErrorCode, Money, RewardId, UserId};
use crate::domain::referral::{ReferralReward, RewardKind};
use crate::ports::RewardApplier;

#[derive(Default)]
struct LedgerState {
    applied: HashSet<RewardId>,
    balances: HashMap<UserId, Money>,
    entitlements: HashSet<(UserId, CourseId)>,
}

/// Credit balances and course entitlements held in memory.
///
/// Applying is keyed by reward id, so a re-driven reward changes nothing.
#[derive(Default)]
pub struct InMemoryRewardLedger {
    state: Mutex<LedgerState>,
    failures_left: AtomicU32,
}

impl InMemoryRewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` applications fail as unavailable.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub async fn balance(&self, user: &UserId) -> Money {
        self.state
            .lock()
            .await
            .balances
            .get(user)
            .copied()
            .unwrap_or(Money::ZERO)
    }

    pub async fn has_entitlement(&self, user: &UserId, course: CourseId) -> bool {
        self.state
            .lock()
            .await
            .entitlements
            .contains(&(user.clone(), course))
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RewardApplier for InMemoryRewardLedger {
    async fn apply(&self, reward: &ReferralReward) -> Result<(), DomainError> {
        if self.take_failure() {
            return Err(DomainError::unavailable("reward ledger unavailable"));
        }

        let mut state = self.state.lock().await;
        if !state.applied.insert(reward.id) {
            return Ok(());
        }
        match reward.kind {
            RewardKind::Credit(amount) => {
                let balance = state.balances.entry(reward.user_id.clone()).or_insert(Money::ZERO);
                *balance = balance.checked_add(amount).ok_or_else(|| {
                    DomainError::new(ErrorCode::InternalError, "Credit balance overflowed")
                })?;
            }
            RewardKind::FreeCourse(course) => {
                state.entitlements.insert((reward.user_id.clone(), course));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Email, ReferralCodeId, Timestamp};
    use crate::domain::referral::{ReferralInvitation, RewardPolicy};

    fn reward(kind: RewardKind) -> ReferralReward {
        let inv = ReferralInvitation::new(
            ReferralCodeId::new(),
            UserId::new("alice").unwrap(),
            Email::try_new("bob@example.com").unwrap(),
            Timestamp::now(),
        );
        RewardPolicy::new(kind).unwrap().reward_for(&inv, Timestamp::now())
    }

    #[tokio::test]
    async fn credit_is_applied_once_per_reward() {
        let ledger = InMemoryRewardLedger::new();
        let r = reward(RewardKind::Credit(Money::from_minor(1_000)));
        ledger.apply(&r).await.unwrap();
        ledger.apply(&r).await.unwrap();
        assert_eq!(ledger.balance(&r.user_id).await, Money::from_minor(1_000));
    }

    #[tokio::test]
    async fn free_course_grants_entitlement() {
        let ledger = InMemoryRewardLedger::new();
        let course = CourseId::new(9).unwrap();
        let r = reward(RewardKind::FreeCourse(course));
        ledger.apply(&r).await.unwrap();
        assert!(ledger.has_entitlement(&r.user_id, course).await);
    }

    #[tokio::test]
    async fn injected_failure_applies_nothing() {
        let ledger = InMemoryRewardLedger::new();
        ledger.fail_next(1);
        let r = reward(RewardKind::Credit(Money::from_minor(500)));
        let err = ledger.apply(&r).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageUnavailable);
        assert_eq!(ledger.balance(&r.user_id).await, Money::ZERO);

        ledger.apply(&r).await.unwrap();
        assert_eq!(ledger.balance(&r.user_id).await, Money::from_minor(500));
    }
}
