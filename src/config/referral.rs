//! Referral program configuration

use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::ValidationError;
use crate::application::handlers::ReferralCodeSettings;
use crate::domain::foundation::{CourseId, Money};
use crate::domain::promotion::CodeString;
use crate::domain::referral::{RewardKind, RewardPolicy};

/// Which reward a referrer earns per conversion.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardType {
    #[default]
    Credit,
    FreeCourse,
}

/// Referral code minting, invitation limits and the reward policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferralConfig {
    /// Prefix of generated codes, e.g. `REF` in `REF-7KQ2M9XA`
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,

    /// Most emails accepted by one invitation request
    #[serde(default = "default_max_invitations_per_request")]
    pub max_invitations_per_request: usize,

    /// Conversions allowed per new code; unset means unlimited
    pub default_max_usage: Option<u32>,

    /// Lifetime of new codes in days; unset means no expiry
    pub code_ttl_days: Option<i64>,

    #[serde(default)]
    pub reward_type: RewardType,

    /// Credit granted per conversion when `reward_type` is CREDIT
    #[serde(default = "default_credit_amount")]
    pub credit_amount: Decimal,

    /// Course granted per conversion when `reward_type` is FREE_COURSE
    pub free_course_id: Option<i64>,
}

impl ReferralConfig {
    pub fn code_settings(&self) -> ReferralCodeSettings {
        ReferralCodeSettings {
            prefix: self.code_prefix.to_uppercase(),
            default_max_usage: self.default_max_usage,
            code_ttl_days: self.code_ttl_days,
        }
    }

    pub fn reward_policy(&self) -> Result<RewardPolicy, ValidationError> {
        let kind = match self.reward_type {
            RewardType::Credit => RewardKind::Credit(
                Money::try_new(self.credit_amount)
                    .map_err(|e| ValidationError::InvalidReward(e.to_string()))?,
            ),
            RewardType::FreeCourse => {
                let id = self
                    .free_course_id
                    .ok_or(ValidationError::MissingRequired("REDEMPTION__REFERRAL__FREE_COURSE_ID"))?;
                RewardKind::FreeCourse(
                    CourseId::new(id).map_err(|e| ValidationError::InvalidReward(e.to_string()))?,
                )
            }
        };
        RewardPolicy::new(kind).map_err(|e| ValidationError::InvalidReward(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        // A full sample code must be a valid code string.
        CodeString::try_new(&format!("{}-ABCDEF12", self.code_prefix))
            .map_err(|_| ValidationError::InvalidCodePrefix(self.code_prefix.clone()))?;
        if self.max_invitations_per_request == 0 || self.max_invitations_per_request > 500 {
            return Err(ValidationError::InvalidInvitationLimit);
        }
        if self.default_max_usage == Some(0) {
            return Err(ValidationError::InvalidReward(
                "default_max_usage must be at least 1".to_string(),
            ));
        }
        if matches!(self.code_ttl_days, Some(days) if days <= 0) {
            return Err(ValidationError::InvalidReward(
                "code_ttl_days must be positive".to_string(),
            ));
        }
        self.reward_policy()?;
        Ok(())
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            code_prefix: default_code_prefix(),
            max_invitations_per_request: default_max_invitations_per_request(),
            default_max_usage: None,
            code_ttl_days: None,
            reward_type: RewardType::Credit,
            credit_amount: default_credit_amount(),
            free_course_id: None,
        }
    }
}

fn default_code_prefix() -> String {
    "REF".to_string()
}

fn default_max_invitations_per_request() -> usize {
    50
}

fn default_credit_amount() -> Decimal {
    Decimal::new(1000, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_ten_credit() {
        let policy = ReferralConfig::default().reward_policy().unwrap();
        assert_eq!(policy.kind(), RewardKind::Credit(Money::from_minor(1_000)));
    }

    #[test]
    fn free_course_requires_course_id() {
        let config = ReferralConfig {
            reward_type: RewardType::FreeCourse,
            ..Default::default()
        };
        assert!(config.reward_policy().is_err());

        let config = ReferralConfig {
            free_course_id: Some(12),
            ..config
        };
        assert_eq!(
            config.reward_policy().unwrap().kind(),
            RewardKind::FreeCourse(CourseId::new(12).unwrap())
        );
    }

    #[test]
    fn zero_credit_is_rejected() {
        let config = ReferralConfig {
            credit_amount: Decimal::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidReward(_))));
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let config = ReferralConfig {
            code_prefix: "R F".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidCodePrefix(_))));
    }

    #[test]
    fn invitation_limit_must_be_positive() {
        let config = ReferralConfig {
            max_invitations_per_request: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidInvitationLimit));
    }

    #[test]
    fn code_settings_uppercase_prefix() {
        let config = ReferralConfig {
            code_prefix: "friend".to_string(),
            code_ttl_days: Some(30),
            ..Default::default()
        };
        let settings = config.code_settings();
        assert_eq!(settings.prefix, "FRIEND");
        assert_eq!(settings.code_ttl_days, Some(30));
    }
}
