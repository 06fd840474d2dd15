//! ReferralReward entity, reward kinds and the reward policy.
//!
//! ```text
//! Pending --(apply succeeds)--> Processed (terminal)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ReferralInvitation;
use crate::domain::foundation::{
    CourseId, InvitationId, Money, RewardId, StateMachine, Timestamp, UserId, ValidationError,
};

/// What the referrer receives for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardKind {
    /// Added to the referrer's running credit balance.
    Credit(Money),
    /// Grants the referrer access to one course.
    FreeCourse(CourseId),
}

impl RewardKind {
    pub const CREDIT: &'static str = "CREDIT";
    pub const FREE_COURSE: &'static str = "FREE_COURSE";

    /// Value of the `reward_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            RewardKind::Credit(_) => Self::CREDIT,
            RewardKind::FreeCourse(_) => Self::FREE_COURSE,
        }
    }

    /// Reads the `reward_type`, `reward_amount` and `course_id` columns.
    pub fn from_columns(
        reward_type: &str,
        amount: Option<Decimal>,
        course_id: Option<i64>,
    ) -> Result<Self, ValidationError> {
        match reward_type {
            Self::CREDIT => {
                let amount = amount.ok_or_else(|| ValidationError::empty_field("reward_amount"))?;
                Ok(RewardKind::Credit(Money::try_new(amount)?))
            }
            Self::FREE_COURSE => {
                let course = course_id.ok_or_else(|| ValidationError::empty_field("course_id"))?;
                Ok(RewardKind::FreeCourse(CourseId::new(course)?))
            }
            other => Err(ValidationError::invalid_format(
                "reward_type",
                format!("unknown reward type '{}'", other),
            )),
        }
    }

    /// Values for the `reward_amount` and `course_id` columns.
    pub fn to_columns(&self) -> (Option<Decimal>, Option<i64>) {
        match self {
            RewardKind::Credit(amount) => (Some(amount.amount()), None),
            RewardKind::FreeCourse(course) => (None, Some(course.value())),
        }
    }

    /// Credit amount, zero for non-credit rewards.
    pub fn credit_amount(&self) -> Money {
        match self {
            RewardKind::Credit(amount) => *amount,
            RewardKind::FreeCourse(_) => Money::ZERO,
        }
    }
}

/// Processing state of a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Pending,
    Processed,
}

impl StateMachine for RewardStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (RewardStatus::Pending, RewardStatus::Processed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            RewardStatus::Pending => vec![RewardStatus::Processed],
            RewardStatus::Processed => vec![],
        }
    }
}

/// A reward issued to a referrer for one converted invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralReward {
    pub id: RewardId,
    /// Exactly one reward exists per invitation.
    pub invitation_id: InvitationId,
    /// The referrer.
    pub user_id: UserId,
    pub kind: RewardKind,
    pub status: RewardStatus,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

impl ReferralReward {
    pub fn is_processed(&self) -> bool {
        self.status == RewardStatus::Processed
    }

    /// Flips the reward to processed.
    pub fn mark_processed(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(RewardStatus::Processed)?;
        self.processed_at = Some(now);
        Ok(())
    }
}

/// Decides the reward granted per conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPolicy {
    kind: RewardKind,
}

impl RewardPolicy {
    pub fn new(kind: RewardKind) -> Result<Self, ValidationError> {
        if let RewardKind::Credit(amount) = kind {
            if amount.is_zero() {
                return Err(ValidationError::invalid_format(
                    "credit_amount",
                    "credit reward must be positive",
                ));
            }
        }
        Ok(Self { kind })
    }

    pub fn kind(&self) -> RewardKind {
        self.kind
    }

    /// Builds the pending reward for a converted invitation.
    pub fn reward_for(&self, invitation: &ReferralInvitation, now: Timestamp) -> ReferralReward {
        ReferralReward {
            id: RewardId::new(),
            invitation_id: invitation.id,
            user_id: invitation.referrer.clone(),
            kind: self.kind,
            status: RewardStatus::Pending,
            created_at: now,
            processed_at: None,
        }
    }
}
