//! Referral code validation.

use serde::{Deserialize, Serialize};

use super::ReferralCode;
use crate::domain::foundation::{Timestamp, UserId};

/// Why a referral code cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferralRejection {
    NotFound,
    Inactive,
    Expired { expired_at: Timestamp },
    Exhausted { used: u32 },
    /// The candidate owns the code.
    SelfReferral,
    /// The invitee already converted under some referral code.
    AlreadyReferred,
}

impl ReferralRejection {
    /// Stable machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ReferralRejection::NotFound => "NOT_FOUND",
            ReferralRejection::Inactive => "INACTIVE",
            ReferralRejection::Expired { .. } => "EXPIRED",
            ReferralRejection::Exhausted { .. } => "EXHAUSTED",
            ReferralRejection::SelfReferral => "SELF_REFERRAL",
            ReferralRejection::AlreadyReferred => "ALREADY_REFERRED",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ReferralRejection::NotFound => "This referral code was not found.".to_string(),
            ReferralRejection::Inactive => "This referral code is no longer active.".to_string(),
            ReferralRejection::Expired { expired_at } => {
                format!("This referral code expired on {}.", expired_at)
            }
            ReferralRejection::Exhausted { used } => {
                format!("This referral code has reached its limit ({} referrals).", used)
            }
            ReferralRejection::SelfReferral => "You cannot use your own referral code.".to_string(),
            ReferralRejection::AlreadyReferred => {
                "This person has already been referred.".to_string()
            }
        }
    }
}

impl std::fmt::Display for ReferralRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

/// Decides whether `candidate` may use `code` at `now`.
///
/// Order: exists, active, not expired, uses left, not the owner, not
/// already converted elsewhere.
pub fn validate_referral_code(
    code: Option<&ReferralCode>,
    candidate: &UserId,
    now: Timestamp,
    candidate_already_converted: bool,
) -> Result<(), ReferralRejection> {
    let code = code.ok_or(ReferralRejection::NotFound)?;
    code.check_usable(now)?;
    if code.is_owned_by(candidate) {
        return Err(ReferralRejection::SelfReferral);
    }
    if candidate_already_converted {
        return Err(ReferralRejection::AlreadyReferred);
    }
    Ok(())
}

/// Picks the pending invitation a registering invitee converts.
///
/// `candidates` are the email's pending invitations paired with their codes,
/// oldest first. The first one that passes [`validate_referral_code`] wins.
/// When none passes, an already-converted email is `AlreadyReferred`;
/// otherwise the earliest invitation's rejection is returned. `None` means
/// there were no candidates.
pub fn choose_invitation<'a, T>(
    candidates: impl IntoIterator<Item = (T, &'a ReferralCode)>,
    invitee: &UserId,
    now: Timestamp,
    already_converted: bool,
) -> Option<Result<T, ReferralRejection>> {
    let mut earliest_rejection = None;
    for (candidate, code) in candidates {
        match validate_referral_code(Some(code), invitee, now, already_converted) {
            Ok(()) => return Some(Ok(candidate)),
            Err(reason) => {
                earliest_rejection.get_or_insert(reason);
            }
        }
    }
    earliest_rejection.map(|reason| {
        if already_converted {
            Err(ReferralRejection::AlreadyReferred)
        } else {
            Err(reason)
        }
    })
}
