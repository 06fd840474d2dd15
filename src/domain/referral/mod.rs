//! Referral domain module.
//!
//! Referral codes, the invitations sent with them, the rewards issued when
//! an invitation converts, and the derived statistics.
//!
//! # Module Structure
//!
//! - `referral_code` - ReferralCode entity
//! - `invitation` - ReferralInvitation and its Pending/Converted lifecycle
//! - `reward` - ReferralReward, RewardKind, RewardPolicy
//! - `validation` - ReferralRejection, validate_referral_code and choose_invitation
//! - `statistics` - ReferralStatistics aggregate

mod invitation;
mod referral_code;
mod reward;
mod statistics;
mod validation;

pub use invitation::{InvitationStatus, ReferralInvitation};
pub use referral_code::ReferralCode;
pub use reward::{ReferralReward, RewardKind, RewardPolicy, RewardStatus};
pub use statistics::ReferralStatistics;
pub use validation::{choose_invitation, validate_referral_code, ReferralRejection};
