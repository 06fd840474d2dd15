//! ReferralCode entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ReferralRejection;
use crate::domain::foundation::{ReferralCodeId, Timestamp, UserId, ValidationError};
use crate::domain::promotion::{CodeString, UsageLimit};

/// Length of the random part of a generated code.
const GENERATED_SUFFIX_LEN: usize = 8;

/// A referral code owned by exactly one user (the referrer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralCode {
    pub id: ReferralCodeId,
    pub code: CodeString,
    pub owner: UserId,
    pub is_active: bool,
    /// Number of converted invitations; never exceeds `max_usage`.
    pub usage_count: u32,
    pub max_usage: UsageLimit,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ReferralCode {
    /// Creates a new active referral code for `owner`.
    pub fn create(
        id: ReferralCodeId,
        code: CodeString,
        owner: UserId,
        max_usage: UsageLimit,
        expires_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            code,
            owner,
            is_active: true,
            usage_count: 0,
            max_usage,
            expires_at,
            created_at: now,
        }
    }

    /// Builds a code string `PREFIX-XXXXXXXX` from a random seed.
    pub fn generate_code(prefix: &str, seed: Uuid) -> Result<CodeString, ValidationError> {
        let suffix: String = seed
            .simple()
            .to_string()
            .to_uppercase()
            .chars()
            .take(GENERATED_SUFFIX_LEN)
            .collect();
        CodeString::try_new(&format!("{}-{}", prefix, suffix))
    }

    /// True if `user` owns this code.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    /// True once the expiry instant has passed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(false, |end| now.is_after(&end))
    }

    /// Subject-independent checks: active, not expired, uses left.
    pub fn check_usable(&self, now: Timestamp) -> Result<(), ReferralRejection> {
        if !self.is_active {
            return Err(ReferralRejection::Inactive);
        }
        if let Some(end) = self.expires_at {
            if now.is_after(&end) {
                return Err(ReferralRejection::Expired { expired_at: end });
            }
        }
        if !self.max_usage.allows_another(self.usage_count) {
            return Err(ReferralRejection::Exhausted {
                used: self.usage_count,
            });
        }
        Ok(())
    }

    /// Consumes one use for a conversion.
    ///
    /// Only the conversion path may call this, inside its atomic unit.
    pub fn consume_use(&mut self) -> Result<(), ReferralRejection> {
        if !self.max_usage.allows_another(self.usage_count) {
            return Err(ReferralRejection::Exhausted {
                used: self.usage_count,
            });
        }
        self.usage_count += 1;
        Ok(())
    }
}
