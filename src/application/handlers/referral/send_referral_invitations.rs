//! SendReferralInvitationsHandler - Command handler for inviting friends.
//!
//! Each address becomes at most one pending invitation per code. Addresses
//! that cannot be invited are reported back with a reason rather than
//! failing the whole batch.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::foundation::{Email, ErrorCode, UserId};
use crate::domain::promotion::CodeString;
use crate::domain::redemption::RedemptionError;
use crate::domain::referral::{ReferralInvitation, ReferralRejection};
use crate::ports::{Clock, ReferralStore};

/// Command to invite a batch of email addresses.
#[derive(Debug, Clone)]
pub struct SendReferralInvitationsCommand {
    pub user_id: UserId,
    pub code: String,
    pub emails: Vec<String>,
}

/// Why an address was not invited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationSkipReason {
    InvalidEmail,
    DuplicateInRequest,
    AlreadyPending,
    AlreadyReferred,
}

/// An address left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInvitation {
    pub email: String,
    pub reason: InvitationSkipReason,
}

/// Result of sending invitations.
#[derive(Debug, Clone, Default)]
pub struct SendReferralInvitationsResult {
    pub sent: Vec<ReferralInvitation>,
    pub skipped: Vec<SkippedInvitation>,
}

/// Handler for sending referral invitations.
pub struct SendReferralInvitationsHandler {
    store: Arc<dyn ReferralStore>,
    clock: Arc<dyn Clock>,
    max_per_request: usize,
}

impl SendReferralInvitationsHandler {
    pub fn new(store: Arc<dyn ReferralStore>, clock: Arc<dyn Clock>, max_per_request: usize) -> Self {
        Self {
            store,
            clock,
            max_per_request,
        }
    }

    pub async fn handle(
        &self,
        cmd: SendReferralInvitationsCommand,
    ) -> Result<SendReferralInvitationsResult, RedemptionError> {
        if cmd.emails.is_empty() {
            return Err(RedemptionError::validation("emails", "at least one email is required"));
        }
        if cmd.emails.len() > self.max_per_request {
            return Err(RedemptionError::validation(
                "emails",
                format!("at most {} emails per request", self.max_per_request),
            ));
        }

        let code = CodeString::try_new(&cmd.code)
            .map_err(|_| RedemptionError::Referral(ReferralRejection::NotFound))?;
        let referral_code = self
            .store
            .find_code(&code)
            .await?
            .ok_or(RedemptionError::Referral(ReferralRejection::NotFound))?;
        if !referral_code.is_owned_by(&cmd.user_id) {
            return Err(RedemptionError::forbidden("referral code belongs to another user"));
        }

        let now = self.clock.now();
        referral_code.check_usable(now)?;

        let mut result = SendReferralInvitationsResult::default();
        let mut seen = HashSet::new();

        for raw in cmd.emails {
            let email = match Email::try_new(&raw) {
                Ok(email) => email,
                Err(_) => {
                    result.skip(raw, InvitationSkipReason::InvalidEmail);
                    continue;
                }
            };
            if !seen.insert(email.clone()) {
                result.skip(raw, InvitationSkipReason::DuplicateInRequest);
                continue;
            }
            if self.store.has_converted_invitation(&email).await? {
                result.skip(raw, InvitationSkipReason::AlreadyReferred);
                continue;
            }
            if self.store.has_pending_invitation(&referral_code.id, &email).await? {
                result.skip(raw, InvitationSkipReason::AlreadyPending);
                continue;
            }

            let invitation =
                ReferralInvitation::new(referral_code.id, cmd.user_id.clone(), email, now);
            match self.store.insert_invitation(&invitation).await {
                Ok(()) => result.sent.push(invitation),
                // Lost a race with a concurrent request for the same address.
                Err(err) if err.code == ErrorCode::DuplicateInvitation => {
                    result.skip(raw, InvitationSkipReason::AlreadyPending);
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(
            user_id = %cmd.user_id,
            code = %referral_code.code,
            sent = result.sent.len(),
            skipped = result.skipped.len(),
            "referral invitations sent"
        );
        Ok(result)
    }
}

impl SendReferralInvitationsResult {
    fn skip(&mut self, email: String, reason: InvitationSkipReason) {
        self.skipped.push(SkippedInvitation { email, reason });
    }
}
