//! ConvertReferralInvitationHandler - Command handler run when an invited
//! email registers.
//!
//! The store converts the invitation, consumes one use of the code and
//! inserts the pending reward as one atomic unit. The reward is applied
//! only after that unit commits; if applying fails the reward stays
//! pending for the sweeper.

use std::sync::Arc;

use super::RewardProcessor;
use crate::application::StorePolicy;
use crate::domain::foundation::{DomainError, Email, ErrorCode, UserId};
use crate::domain::redemption::RedemptionError;
use crate::domain::referral::{
    choose_invitation, ReferralInvitation, ReferralRejection, ReferralReward, RewardPolicy,
};
use crate::ports::{Clock, ConversionOutcome, ConversionRequest, ReferralStore};

/// Command to convert the pending invitation for a newly registered user.
#[derive(Debug, Clone)]
pub struct ConvertReferralInvitationCommand {
    pub email: String,
    pub registering_user_id: UserId,
}

/// Result of a conversion.
#[derive(Debug, Clone)]
pub struct ConvertReferralInvitationResult {
    pub invitation: ReferralInvitation,
    /// The reward as last known; pending if applying it failed.
    pub reward: ReferralReward,
}

/// Handler for referral conversion.
pub struct ConvertReferralInvitationHandler {
    store: Arc<dyn ReferralStore>,
    processor: RewardProcessor,
    clock: Arc<dyn Clock>,
    reward_policy: RewardPolicy,
    policy: StorePolicy,
}

impl ConvertReferralInvitationHandler {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        processor: RewardProcessor,
        clock: Arc<dyn Clock>,
        reward_policy: RewardPolicy,
        policy: StorePolicy,
    ) -> Self {
        Self {
            store,
            processor,
            clock,
            reward_policy,
            policy,
        }
    }

    /// Returns `None` when the email has no pending invitation.
    pub async fn handle(
        &self,
        cmd: ConvertReferralInvitationCommand,
    ) -> Result<Option<ConvertReferralInvitationResult>, RedemptionError> {
        let request = ConversionRequest {
            email: Email::try_new(&cmd.email)?,
            invitee: cmd.registering_user_id,
            policy: self.reward_policy,
            now: self.clock.now(),
        };

        let (invitation, mut reward) = match self.convert_with_retry(&request).await? {
            ConversionOutcome::Converted { invitation, reward } => (invitation, reward),
            ConversionOutcome::NoPendingInvitation => {
                tracing::debug!(email = %request.email, "no pending invitation to convert");
                return Ok(None);
            }
            ConversionOutcome::Rejected(reason) => {
                tracing::info!(
                    email = %request.email,
                    invitee = %request.invitee,
                    reason = reason.reason_code(),
                    "referral conversion rejected"
                );
                return Err(reason.into());
            }
        };

        tracing::info!(
            invitation_id = %invitation.id,
            referrer = %invitation.referrer,
            invitee = %request.invitee,
            reward_id = %reward.id,
            "referral invitation converted"
        );

        match self.processor.process(&reward).await {
            Ok(_) => {
                if let Err(err) = reward.mark_processed(self.clock.now()) {
                    tracing::debug!(reward_id = %reward.id, error = %err, "reward already processed");
                }
            }
            Err(err) => {
                tracing::warn!(reward_id = %reward.id, error = %err, "reward processing failed, left pending");
            }
        }

        Ok(Some(ConvertReferralInvitationResult { invitation, reward }))
    }

    async fn convert_with_retry(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, RedemptionError> {
        let mut conflicts = 0u32;
        loop {
            match self
                .policy
                .call("convert_invitation", self.store.convert_invitation(request))
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.code == ErrorCode::StorageConflict => {
                    conflicts += 1;
                    if conflicts > self.policy.max_conflict_retries {
                        tracing::warn!(email = %request.email, conflicts, "conflict retries exhausted");
                        return self.resolve_from_fresh_state(request).await;
                    }
                    tracing::debug!(email = %request.email, attempt = conflicts, "retrying after conflict");
                }
                Err(err) => {
                    tracing::error!(email = %request.email, error = %err, "referral conversion failed");
                    return Err(err.into());
                }
            }
        }
    }

    /// Decides the outcome from fresh rows once conflict retries run out.
    ///
    /// The same choice the store makes is repeated against current state. If
    /// an invitation still qualifies, the contended code is reported as
    /// exhausted at its current count.
    async fn resolve_from_fresh_state(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, RedemptionError> {
        let pending = self
            .policy
            .call(
                "find_pending_invitations",
                self.store.find_pending_invitations(&request.email),
            )
            .await?;
        let already_converted = self
            .policy
            .call(
                "has_converted_invitation",
                self.store.has_converted_invitation(&request.email),
            )
            .await?;

        let mut codes = Vec::with_capacity(pending.len());
        for invitation in &pending {
            let code_id = invitation.referral_code_id;
            let code = self
                .policy
                .call("find_code_by_id", self.store.find_code_by_id(&code_id))
                .await?
                .ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::DataCorruption,
                        format!("Invitation references missing referral code {}", code_id),
                    )
                })?;
            codes.push(code);
        }

        let outcome = match choose_invitation(
            codes.iter().map(|code| (code, code)),
            &request.invitee,
            request.now,
            already_converted,
        ) {
            None => ConversionOutcome::NoPendingInvitation,
            Some(Err(reason)) => ConversionOutcome::Rejected(reason),
            Some(Ok(code)) => ConversionOutcome::Rejected(ReferralRejection::Exhausted {
                used: code.usage_count,
            }),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixedClock, InMemoryReferralStore, InMemoryRewardLedger};
    use crate::domain::foundation::{CourseId, Money, ReferralCodeId, RewardId, Timestamp};
    use crate::domain::promotion::{CodeString, UsageLimit};
    use crate::domain::referral::{ReferralCode, ReferralStatistics, RewardKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    /// Conflicts on the first `conflicts` conversions, then delegates.
    struct ContendedStore {
        inner: InMemoryReferralStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl ReferralStore for ContendedStore {
        async fn find_code(&self, code: &CodeString) -> Result<Option<ReferralCode>, DomainError> {
            self.inner.find_code(code).await
        }

        async fn find_code_by_id(
            &self,
            id: &ReferralCodeId,
        ) -> Result<Option<ReferralCode>, DomainError> {
            self.inner.find_code_by_id(id).await
        }

        async fn find_active_code_for_owner(
            &self,
            owner: &UserId,
            now: Timestamp,
        ) -> Result<Option<ReferralCode>, DomainError> {
            self.inner.find_active_code_for_owner(owner, now).await
        }

        async fn insert_code(&self, code: &ReferralCode) -> Result<(), DomainError> {
            self.inner.insert_code(code).await
        }

        async fn has_converted_invitation(&self, email: &Email) -> Result<bool, DomainError> {
            self.inner.has_converted_invitation(email).await
        }

        async fn has_pending_invitation(
            &self,
            id: &ReferralCodeId,
            email: &Email,
        ) -> Result<bool, DomainError> {
            self.inner.has_pending_invitation(id, email).await
        }

        async fn find_pending_invitations(
            &self,
            email: &Email,
        ) -> Result<Vec<ReferralInvitation>, DomainError> {
            self.inner.find_pending_invitations(email).await
        }

        async fn insert_invitation(&self, inv: &ReferralInvitation) -> Result<(), DomainError> {
            self.inner.insert_invitation(inv).await
        }

        async fn convert_invitation(
            &self,
            request: &ConversionRequest,
        ) -> Result<ConversionOutcome, DomainError> {
            let conflict = self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if conflict {
                return Err(DomainError::conflict("could not serialize access"));
            }
            self.inner.convert_invitation(request).await
        }

        async fn find_unprocessed_rewards(&self, limit: u32) -> Result<Vec<ReferralReward>, DomainError> {
            self.inner.find_unprocessed_rewards(limit).await
        }

        async fn mark_reward_processed(&self, id: &RewardId, now: Timestamp) -> Result<bool, DomainError> {
            self.inner.mark_reward_processed(id, now).await
        }

        async fn statistics(&self, referrer: &UserId) -> Result<ReferralStatistics, DomainError> {
            self.inner.statistics(referrer).await
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn invite(store: &dyn ReferralStore, address: &str, now: Timestamp) -> ReferralCode {
        let code = match store.find_active_code_for_owner(&user("referrer"), now).await.unwrap() {
            Some(code) => code,
            None => {
                let code = ReferralCode::create(
                    ReferralCodeId::new(),
                    CodeString::try_new("REF-CCCC3333").unwrap(),
                    user("referrer"),
                    UsageLimit::Unlimited,
                    None,
                    now,
                );
                store.insert_code(&code).await.unwrap();
                code
            }
        };
        store
            .insert_invitation(&ReferralInvitation::new(
                code.id,
                code.owner.clone(),
                Email::try_new(address).unwrap(),
                now,
            ))
            .await
            .unwrap();
        code
    }

    fn handler(
        store: Arc<dyn ReferralStore>,
        ledger: Arc<InMemoryRewardLedger>,
        kind: RewardKind,
        now: Timestamp,
    ) -> ConvertReferralInvitationHandler {
        let clock = Arc::new(FixedClock::new(now));
        ConvertReferralInvitationHandler::new(
            store.clone(),
            RewardProcessor::new(store, ledger, clock.clone()),
            clock,
            RewardPolicy::new(kind).unwrap(),
            StorePolicy::default(),
        )
    }

    fn command(email: &str, invitee: &str) -> ConvertReferralInvitationCommand {
        ConvertReferralInvitationCommand {
            email: email.to_string(),
            registering_user_id: user(invitee),
        }
    }

    fn credit() -> RewardKind {
        RewardKind::Credit(Money::from_minor(1_500))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn conversion_applies_credit_reward() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryReferralStore::new());
        let code = invite(store.as_ref(), "friend@example.com", now).await;
        let ledger = Arc::new(InMemoryRewardLedger::new());
        let handler = handler(store.clone(), ledger.clone(), credit(), now);

        let result = handler
            .handle(command("Friend@Example.com", "friend"))
            .await
            .unwrap()
            .unwrap();

        assert!(result.invitation.is_converted());
        assert!(result.reward.is_processed());
        assert_eq!(ledger.balance(&user("referrer")).await, Money::from_minor(1_500));
        let code = store.find_code(&code.code).await.unwrap().unwrap();
        assert_eq!(code.usage_count, 1);
    }

    #[tokio::test]
    async fn free_course_reward_grants_entitlement() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryReferralStore::new());
        invite(store.as_ref(), "friend@example.com", now).await;
        let ledger = Arc::new(InMemoryRewardLedger::new());
        let course = CourseId::new(42).unwrap();
        let handler = handler(store, ledger.clone(), RewardKind::FreeCourse(course), now);

        handler.handle(command("friend@example.com", "friend")).await.unwrap();
        assert!(ledger.has_entitlement(&user("referrer"), course).await);
    }

    #[tokio::test]
    async fn unknown_email_returns_none() {
        let now = Timestamp::now();
        let handler = handler(
            Arc::new(InMemoryReferralStore::new()),
            Arc::new(InMemoryRewardLedger::new()),
            credit(),
            now,
        );
        let result = handler.handle(command("nobody@example.com", "nobody")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn referrer_cannot_convert_own_invitation() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryReferralStore::new());
        invite(store.as_ref(), "me@example.com", now).await;
        let handler = handler(store, Arc::new(InMemoryRewardLedger::new()), credit(), now);

        let err = handler.handle(command("me@example.com", "referrer")).await.unwrap_err();
        assert_eq!(err, RedemptionError::Referral(ReferralRejection::SelfReferral));
    }

    #[tokio::test]
    async fn ledger_failure_leaves_reward_pending() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryReferralStore::new());
        invite(store.as_ref(), "friend@example.com", now).await;
        let ledger = Arc::new(InMemoryRewardLedger::new());
        ledger.fail_next(1);
        let handler = handler(store.clone(), ledger.clone(), credit(), now);

        let result = handler
            .handle(command("friend@example.com", "friend"))
            .await
            .unwrap()
            .unwrap();
        assert!(!result.reward.is_processed());
        assert_eq!(store.find_unprocessed_rewards(10).await.unwrap().len(), 1);
        assert_eq!(ledger.balance(&user("referrer")).await, Money::ZERO);
    }

    #[tokio::test]
    async fn transient_conflicts_are_retried() {
        let now = Timestamp::now();
        let inner = InMemoryReferralStore::new();
        invite(&inner, "friend@example.com", now).await;
        let store = Arc::new(ContendedStore {
            inner,
            conflicts: AtomicU32::new(2),
        });
        let handler = handler(store, Arc::new(InMemoryRewardLedger::new()), credit(), now);

        let result = handler.handle(command("friend@example.com", "friend")).await.unwrap();
        assert!(result.is_some());
    }

    fn contended(inner: InMemoryReferralStore) -> Arc<ContendedStore> {
        Arc::new(ContendedStore {
            inner,
            conflicts: AtomicU32::new(100),
        })
    }

    #[tokio::test]
    async fn persistent_conflict_resolves_from_fresh_state() {
        let now = Timestamp::now();
        let inner = InMemoryReferralStore::new();
        invite(&inner, "friend@example.com", now).await;
        let store = contended(inner);
        let handler = handler(store.clone(), Arc::new(InMemoryRewardLedger::new()), credit(), now);

        let err = handler.handle(command("friend@example.com", "friend")).await.unwrap_err();
        assert_eq!(
            err,
            RedemptionError::Referral(ReferralRejection::Exhausted { used: 0 })
        );
        assert!(!err.is_retryable());
        assert!(store.inner.rewards().await.is_empty());
    }

    #[tokio::test]
    async fn persistent_conflict_after_conversion_is_already_referred() {
        let now = Timestamp::now();
        let inner = InMemoryReferralStore::new();
        invite(&inner, "friend@example.com", now).await;
        inner
            .convert_invitation(&ConversionRequest {
                email: Email::try_new("friend@example.com").unwrap(),
                invitee: user("friend"),
                policy: RewardPolicy::new(credit()).unwrap(),
                now,
            })
            .await
            .unwrap();
        let second = ReferralCode::create(
            ReferralCodeId::new(),
            CodeString::try_new("REF-DDDD4444").unwrap(),
            user("second"),
            UsageLimit::Unlimited,
            None,
            now,
        );
        inner.insert_code(&second).await.unwrap();
        inner
            .insert_invitation(&ReferralInvitation::new(
                second.id,
                user("second"),
                Email::try_new("friend@example.com").unwrap(),
                now,
            ))
            .await
            .unwrap();
        let handler = handler(contended(inner), Arc::new(InMemoryRewardLedger::new()), credit(), now);

        let err = handler.handle(command("friend@example.com", "friend")).await.unwrap_err();
        assert_eq!(err, RedemptionError::Referral(ReferralRejection::AlreadyReferred));
    }

    #[tokio::test]
    async fn persistent_conflict_without_pending_invitation_returns_none() {
        let now = Timestamp::now();
        let handler = handler(
            contended(InMemoryReferralStore::new()),
            Arc::new(InMemoryRewardLedger::new()),
            credit(),
            now,
        );
        let result = handler.handle(command("friend@example.com", "friend")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn conversion_falls_through_to_next_usable_invitation() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryReferralStore::new());
        let capped = ReferralCode::create(
            ReferralCodeId::new(),
            CodeString::try_new("REF-EEEE5555").unwrap(),
            user("alice"),
            UsageLimit::capped(1).unwrap(),
            None,
            now,
        );
        store.insert_code(&capped).await.unwrap();
        for address in ["first@example.com", "carol@example.com"] {
            store
                .insert_invitation(&ReferralInvitation::new(
                    capped.id,
                    user("alice"),
                    Email::try_new(address).unwrap(),
                    now.minus_days(1),
                ))
                .await
                .unwrap();
        }
        let bob_code = invite(store.as_ref(), "carol@example.com", now).await;
        let ledger = Arc::new(InMemoryRewardLedger::new());
        let handler = handler(store.clone(), ledger.clone(), credit(), now);

        handler.handle(command("first@example.com", "first")).await.unwrap();
        let result = handler
            .handle(command("carol@example.com", "carol"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.invitation.referral_code_id, bob_code.id);
        assert_eq!(ledger.balance(&user("referrer")).await, Money::from_minor(1_500));
        let bob_code = store.find_code(&bob_code.code).await.unwrap().unwrap();
        assert_eq!(bob_code.usage_count, 1);
    }
}
