//! Reward processing - applies pending rewards and marks them processed.
//!
//! Applying is idempotent per reward id and marking is a conditional
//! update, so a reward that fails between the two steps is simply applied
//! again (as a no-op) on the next pass.

use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::domain::redemption::RedemptionError;
use crate::domain::referral::ReferralReward;
use crate::ports::{Clock, ReferralStore, RewardApplier};

/// Applies one reward and flips it to processed.
#[derive(Clone)]
pub struct RewardProcessor {
    store: Arc<dyn ReferralStore>,
    applier: Arc<dyn RewardApplier>,
    clock: Arc<dyn Clock>,
}

impl RewardProcessor {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        applier: Arc<dyn RewardApplier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            applier,
            clock,
        }
    }

    /// Returns true if this call flipped the reward to processed.
    pub async fn process(&self, reward: &ReferralReward) -> Result<bool, DomainError> {
        if reward.is_processed() {
            return Ok(false);
        }
        self.applier.apply(reward).await?;
        let flipped = self
            .store
            .mark_reward_processed(&reward.id, self.clock.now())
            .await?;
        if flipped {
            tracing::info!(
                reward_id = %reward.id,
                user_id = %reward.user_id,
                reward_type = reward.kind.type_name(),
                "referral reward processed"
            );
        }
        Ok(flipped)
    }
}

/// Command to re-drive unprocessed rewards.
#[derive(Debug, Clone, Copy)]
pub struct ProcessPendingRewardsCommand {
    pub limit: u32,
}

/// Outcome of one re-drive pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessPendingRewardsResult {
    pub processed: u32,
    pub failed: u32,
}

/// Handler that processes a batch of pending rewards.
pub struct ProcessPendingRewardsHandler {
    store: Arc<dyn ReferralStore>,
    processor: RewardProcessor,
}

impl ProcessPendingRewardsHandler {
    pub fn new(store: Arc<dyn ReferralStore>, processor: RewardProcessor) -> Self {
        Self { store, processor }
    }

    pub async fn handle(
        &self,
        cmd: ProcessPendingRewardsCommand,
    ) -> Result<ProcessPendingRewardsResult, RedemptionError> {
        let rewards = self.store.find_unprocessed_rewards(cmd.limit).await?;
        let mut result = ProcessPendingRewardsResult::default();

        for reward in &rewards {
            match self.processor.process(reward).await {
                Ok(true) => result.processed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(reward_id = %reward.id, error = %err, "reward processing failed, left pending");
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixedClock, InMemoryReferralStore, InMemoryRewardLedger};
    use crate::domain::foundation::{Email, Money, ReferralCodeId, Timestamp, UserId};
    use crate::domain::promotion::{CodeString, UsageLimit};
    use crate::domain::referral::{ReferralCode, ReferralInvitation, RewardKind, RewardPolicy};
    use crate::ports::{ConversionOutcome, ConversionRequest};

    async fn store_with_reward(now: Timestamp) -> (Arc<InMemoryReferralStore>, ReferralReward) {
        let store = Arc::new(InMemoryReferralStore::new());
        let code = ReferralCode::create(
            ReferralCodeId::new(),
            CodeString::try_new("REF-BBBB2222").unwrap(),
            UserId::new("referrer").unwrap(),
            UsageLimit::Unlimited,
            None,
            now,
        );
        store.insert_code(&code).await.unwrap();
        let email = Email::try_new("friend@example.com").unwrap();
        store
            .insert_invitation(&ReferralInvitation::new(code.id, code.owner.clone(), email.clone(), now))
            .await
            .unwrap();
        let outcome = store
            .convert_invitation(&ConversionRequest {
                email,
                invitee: UserId::new("friend").unwrap(),
                policy: RewardPolicy::new(RewardKind::Credit(Money::from_minor(1_000))).unwrap(),
                now,
            })
            .await
            .unwrap();
        match outcome {
            ConversionOutcome::Converted { reward, .. } => (store, reward),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn handler(
        store: Arc<InMemoryReferralStore>,
        ledger: Arc<InMemoryRewardLedger>,
        now: Timestamp,
    ) -> ProcessPendingRewardsHandler {
        let processor = RewardProcessor::new(store.clone(), ledger, Arc::new(FixedClock::new(now)));
        ProcessPendingRewardsHandler::new(store, processor)
    }

    #[tokio::test]
    async fn failed_reward_stays_pending_and_is_redriven() {
        let now = Timestamp::now();
        let (store, reward) = store_with_reward(now).await;
        let ledger = Arc::new(InMemoryRewardLedger::new());
        ledger.fail_next(1);
        let handler = handler(store.clone(), ledger.clone(), now);

        let first = handler.handle(ProcessPendingRewardsCommand { limit: 10 }).await.unwrap();
        assert_eq!(first, ProcessPendingRewardsResult { processed: 0, failed: 1 });
        assert_eq!(store.find_unprocessed_rewards(10).await.unwrap().len(), 1);

        let second = handler.handle(ProcessPendingRewardsCommand { limit: 10 }).await.unwrap();
        assert_eq!(second, ProcessPendingRewardsResult { processed: 1, failed: 0 });
        assert_eq!(ledger.balance(&reward.user_id).await, Money::from_minor(1_000));
    }

    #[tokio::test]
    async fn processing_twice_applies_once() {
        let now = Timestamp::now();
        let (store, reward) = store_with_reward(now).await;
        let ledger = Arc::new(InMemoryRewardLedger::new());
        let processor = RewardProcessor::new(store.clone(), ledger.clone(), Arc::new(FixedClock::new(now)));

        assert!(processor.process(&reward).await.unwrap());
        assert!(!processor.process(&reward).await.unwrap());
        assert_eq!(ledger.balance(&reward.user_id).await, Money::from_minor(1_000));
    }

    #[tokio::test]
    async fn nothing_pending_is_a_no_op() {
        let handler = handler(
            Arc::new(InMemoryReferralStore::new()),
            Arc::new(InMemoryRewardLedger::new()),
            Timestamp::now(),
        );
        let result = handler.handle(ProcessPendingRewardsCommand { limit: 10 }).await.unwrap();
        assert_eq!(result, ProcessPendingRewardsResult::default());
    }
}
