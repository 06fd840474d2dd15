//! In-memory ReferralStore.
//!
//! Conversion looks invitations up by email across every code, so the whole
//! referral state sits behind one mutex and each operation runs to
//! completion while holding it.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::foundation::{
    DomainError, Email, ErrorCode, Money, ReferralCodeId, RewardId, Timestamp, UserId,
};
use crate::domain::promotion::CodeString;
use crate::domain::referral::{
    choose_invitation, ReferralCode, ReferralInvitation, ReferralReward, ReferralStatistics,
    RewardKind,
};
use crate::ports::{ConversionOutcome, ConversionRequest, ReferralStore};

#[derive(Default)]
struct ReferralState {
    codes: HashMap<ReferralCodeId, ReferralCode>,
    by_code: HashMap<CodeString, ReferralCodeId>,
    invitations: Vec<ReferralInvitation>,
    rewards: Vec<ReferralReward>,
}

impl ReferralState {
    fn has_converted(&self, email: &Email) -> bool {
        self.invitations
            .iter()
            .any(|inv| &inv.email == email && inv.is_converted())
    }
}

/// Referral store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryReferralStore {
    state: Mutex<ReferralState>,
}

impl InMemoryReferralStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invitation, in insertion order.
    pub async fn invitations(&self) -> Vec<ReferralInvitation> {
        self.state.lock().await.invitations.clone()
    }

    /// Every reward, in insertion order.
    pub async fn rewards(&self) -> Vec<ReferralReward> {
        self.state.lock().await.rewards.clone()
    }
}

#[async_trait]
impl ReferralStore for InMemoryReferralStore {
    async fn find_code(&self, code: &CodeString) -> Result<Option<ReferralCode>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .by_code
            .get(code)
            .and_then(|id| state.codes.get(id))
            .cloned())
    }

    async fn find_code_by_id(
        &self,
        id: &ReferralCodeId,
    ) -> Result<Option<ReferralCode>, DomainError> {
        Ok(self.state.lock().await.codes.get(id).cloned())
    }

    async fn find_active_code_for_owner(
        &self,
        owner: &UserId,
        now: Timestamp,
    ) -> Result<Option<ReferralCode>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .codes
            .values()
            .filter(|c| c.is_owned_by(owner) && c.is_active && !c.is_expired(now))
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn insert_code(&self, code: &ReferralCode) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if state.by_code.contains_key(&code.code) {
            return Err(DomainError::new(
                ErrorCode::ReferralCodeExists,
                format!("Referral code {} already exists", code.code),
            ));
        }
        state.by_code.insert(code.code.clone(), code.id);
        state.codes.insert(code.id, code.clone());
        Ok(())
    }

    async fn has_converted_invitation(&self, email: &Email) -> Result<bool, DomainError> {
        Ok(self.state.lock().await.has_converted(email))
    }

    async fn has_pending_invitation(
        &self,
        referral_code_id: &ReferralCodeId,
        email: &Email,
    ) -> Result<bool, DomainError> {
        let state = self.state.lock().await;
        Ok(state.invitations.iter().any(|inv| {
            &inv.referral_code_id == referral_code_id && &inv.email == email && !inv.is_converted()
        }))
    }

    async fn find_pending_invitations(
        &self,
        email: &Email,
    ) -> Result<Vec<ReferralInvitation>, DomainError> {
        let state = self.state.lock().await;
        let mut pending: Vec<ReferralInvitation> = state
            .invitations
            .iter()
            .filter(|inv| &inv.email == email && !inv.is_converted())
            .cloned()
            .collect();
        pending.sort_by_key(|inv| inv.invited_at);
        Ok(pending)
    }

    async fn insert_invitation(&self, invitation: &ReferralInvitation) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let duplicate = state.invitations.iter().any(|inv| {
            inv.referral_code_id == invitation.referral_code_id
                && inv.email == invitation.email
                && !inv.is_converted()
        });
        if duplicate {
            return Err(DomainError::new(
                ErrorCode::DuplicateInvitation,
                format!("{} already has a pending invitation", invitation.email),
            ));
        }
        state.invitations.push(invitation.clone());
        Ok(())
    }

    async fn convert_invitation(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, DomainError> {
        let mut state = self.state.lock().await;

        let mut pending: Vec<usize> = state
            .invitations
            .iter()
            .enumerate()
            .filter(|(_, inv)| inv.email == request.email && !inv.is_converted())
            .map(|(i, _)| i)
            .collect();
        pending.sort_by_key(|&i| state.invitations[i].invited_at);

        let mut candidates = Vec::with_capacity(pending.len());
        for &index in &pending {
            let code_id = state.invitations[index].referral_code_id;
            let code = state.codes.get(&code_id).ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DataCorruption,
                    format!("Invitation references missing referral code {}", code_id),
                )
            })?;
            candidates.push((index, code));
        }

        let already_converted = state.has_converted(&request.email);
        let index = match choose_invitation(
            candidates,
            &request.invitee,
            request.now,
            already_converted,
        ) {
            None => return Ok(ConversionOutcome::NoPendingInvitation),
            Some(Err(reason)) => return Ok(ConversionOutcome::Rejected(reason)),
            Some(Ok(index)) => index,
        };

        let code_id = state.invitations[index].referral_code_id;
        let mut code = match state.codes.get(&code_id) {
            Some(code) => code.clone(),
            None => {
                return Err(DomainError::new(
                    ErrorCode::DataCorruption,
                    format!("Invitation references missing referral code {}", code_id),
                ))
            }
        };
        if let Err(reason) = code.consume_use() {
            return Ok(ConversionOutcome::Rejected(reason));
        }

        let mut invitation = state.invitations[index].clone();
        invitation.convert(request.invitee.clone(), request.now)?;
        let reward = request.policy.reward_for(&invitation, request.now);

        state.codes.insert(code_id, code);
        state.invitations[index] = invitation.clone();
        state.rewards.push(reward.clone());
        Ok(ConversionOutcome::Converted { invitation, reward })
    }

    async fn find_unprocessed_rewards(&self, limit: u32) -> Result<Vec<ReferralReward>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .rewards
            .iter()
            .filter(|r| !r.is_processed())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_reward_processed(&self, id: &RewardId, now: Timestamp) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        let reward = state
            .rewards
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| DomainError::new(ErrorCode::RewardNotFound, format!("Reward {} not found", id)))?;
        if reward.is_processed() {
            return Ok(false);
        }
        reward.mark_processed(now)?;
        Ok(true)
    }

    async fn statistics(&self, referrer: &UserId) -> Result<ReferralStatistics, DomainError> {
        let state = self.state.lock().await;
        let sent: Vec<_> = state
            .invitations
            .iter()
            .filter(|inv| &inv.referrer == referrer)
            .collect();
        let successful = sent.iter().filter(|inv| inv.is_converted()).count() as u64;
        let mut credit = Money::ZERO;
        for reward in state.rewards.iter().filter(|r| &r.user_id == referrer && r.is_processed()) {
            if let RewardKind::Credit(amount) = reward.kind {
                credit = credit.checked_add(amount).ok_or_else(|| {
                    DomainError::new(ErrorCode::InternalError, "Credit total overflowed")
                })?;
            }
        }
        Ok(ReferralStatistics::from_counts(sent.len() as u64, successful, credit))
    }
}
