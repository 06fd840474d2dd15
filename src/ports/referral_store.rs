//! Referral store port.
//!
//! Durable records for referral codes, invitations and rewards.
//!
//! # Design
//!
//! - **Single writer of counters**: `usage_count` changes only through
//!   [`ReferralStore::convert_invitation`]
//! - **Atomic unit**: conversion marks the invitation, consumes one use of
//!   the code and inserts the reward together or not at all
//! - **Uniqueness**: one pending invitation per (code, email), one converted
//!   invitation per email, one reward per invitation

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Email, ReferralCodeId, RewardId, Timestamp, UserId};
use crate::domain::promotion::CodeString;
use crate::domain::referral::{
    ReferralCode, ReferralInvitation, ReferralRejection, ReferralReward, ReferralStatistics,
    RewardPolicy,
};

/// Registration event to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub email: Email,
    pub invitee: UserId,
    pub policy: RewardPolicy,
    pub now: Timestamp,
}

/// What the conversion unit decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Invitation converted and a pending reward created.
    Converted {
        invitation: ReferralInvitation,
        reward: ReferralReward,
    },
    /// No pending invitation exists for the email.
    NoPendingInvitation,
    /// Nothing written.
    Rejected(ReferralRejection),
}

/// Repository port for the referral tables.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Point lookup by code string.
    async fn find_code(&self, code: &CodeString) -> Result<Option<ReferralCode>, DomainError>;

    /// Point lookup by id.
    async fn find_code_by_id(&self, id: &ReferralCodeId)
        -> Result<Option<ReferralCode>, DomainError>;

    /// The owner's active, unexpired code, newest first.
    async fn find_active_code_for_owner(
        &self,
        owner: &UserId,
        now: Timestamp,
    ) -> Result<Option<ReferralCode>, DomainError>;

    /// Insert a new code.
    ///
    /// # Errors
    ///
    /// - `ReferralCodeExists` if the code string is taken
    async fn insert_code(&self, code: &ReferralCode) -> Result<(), DomainError>;

    /// True if the email converted under any code.
    async fn has_converted_invitation(&self, email: &Email) -> Result<bool, DomainError>;

    /// True if the email holds a pending invitation for this code.
    async fn has_pending_invitation(
        &self,
        referral_code_id: &ReferralCodeId,
        email: &Email,
    ) -> Result<bool, DomainError>;

    /// Pending invitations for the email across every code, oldest first.
    async fn find_pending_invitations(
        &self,
        email: &Email,
    ) -> Result<Vec<ReferralInvitation>, DomainError>;

    /// Insert a pending invitation.
    ///
    /// # Errors
    ///
    /// - `DuplicateInvitation` if a pending invitation already exists for
    ///   this (code, email)
    async fn insert_invitation(&self, invitation: &ReferralInvitation) -> Result<(), DomainError>;

    /// Convert the email's earliest pending invitation whose code the
    /// invitee may use, atomically.
    ///
    /// Invitations on unusable codes are skipped. `Rejected` is returned
    /// only when no pending invitation qualifies.
    ///
    /// # Errors
    ///
    /// - `StorageConflict` on contention; nothing was applied
    /// - `StorageUnavailable` when the store cannot be reached
    async fn convert_invitation(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, DomainError>;

    /// Rewards still waiting to be applied, oldest first.
    async fn find_unprocessed_rewards(&self, limit: u32) -> Result<Vec<ReferralReward>, DomainError>;

    /// Flip a reward to processed. Returns `false` if it already was.
    async fn mark_reward_processed(&self, id: &RewardId, now: Timestamp) -> Result<bool, DomainError>;

    /// Aggregates for one referrer, computed from the source rows.
    async fn statistics(&self, referrer: &UserId) -> Result<ReferralStatistics, DomainError>;
}
