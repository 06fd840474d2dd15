//! GenerateReferralCodeHandler - Command handler for a user's referral code.
//!
//! Returns the user's newest active code when one exists, otherwise mints
//! `PREFIX-XXXXXXXX` and retries on the rare code collision.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::foundation::{ErrorCode, ReferralCodeId, UserId};
use crate::domain::promotion::UsageLimit;
use crate::domain::redemption::RedemptionError;
use crate::domain::referral::ReferralCode;
use crate::ports::{Clock, ReferralStore};

const MAX_COLLISION_ATTEMPTS: u32 = 5;

/// How new referral codes are minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralCodeSettings {
    pub prefix: String,
    /// `None` means unlimited conversions.
    pub default_max_usage: Option<u32>,
    /// `None` means the code never expires.
    pub code_ttl_days: Option<i64>,
}

impl Default for ReferralCodeSettings {
    fn default() -> Self {
        Self {
            prefix: "REF".to_string(),
            default_max_usage: None,
            code_ttl_days: None,
        }
    }
}

/// Command to get or create a referral code.
#[derive(Debug, Clone)]
pub struct GenerateReferralCodeCommand {
    pub user_id: UserId,
}

/// Result of generating a referral code.
#[derive(Debug, Clone)]
pub struct GenerateReferralCodeResult {
    pub code: ReferralCode,
    /// False when an existing code was returned.
    pub created: bool,
}

/// Handler for referral code generation.
pub struct GenerateReferralCodeHandler {
    store: Arc<dyn ReferralStore>,
    clock: Arc<dyn Clock>,
    settings: ReferralCodeSettings,
}

impl GenerateReferralCodeHandler {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        clock: Arc<dyn Clock>,
        settings: ReferralCodeSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: GenerateReferralCodeCommand,
    ) -> Result<GenerateReferralCodeResult, RedemptionError> {
        let now = self.clock.now();

        if let Some(code) = self.store.find_active_code_for_owner(&cmd.user_id, now).await? {
            return Ok(GenerateReferralCodeResult {
                code,
                created: false,
            });
        }

        let max_usage = match self.settings.default_max_usage {
            Some(max) => UsageLimit::capped(max)?,
            None => UsageLimit::Unlimited,
        };
        let expires_at = self.settings.code_ttl_days.map(|days| now.add_days(days));

        for attempt in 1..=MAX_COLLISION_ATTEMPTS {
            let value = ReferralCode::generate_code(&self.settings.prefix, Uuid::new_v4())?;
            let code = ReferralCode::create(
                ReferralCodeId::new(),
                value,
                cmd.user_id.clone(),
                max_usage,
                expires_at,
                now,
            );

            match self.store.insert_code(&code).await {
                Ok(()) => {
                    tracing::info!(user_id = %cmd.user_id, code = %code.code, "referral code created");
                    return Ok(GenerateReferralCodeResult {
                        code,
                        created: true,
                    });
                }
                Err(err) if err.code == ErrorCode::ReferralCodeExists => {
                    tracing::debug!(attempt, code = %code.code, "referral code collision");
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::error!(user_id = %cmd.user_id, "could not mint a unique referral code");
        Err(RedemptionError::Infrastructure(format!(
            "no unique referral code after {} attempts",
            MAX_COLLISION_ATTEMPTS
        )))
    }
}
