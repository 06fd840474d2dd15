//! Referral command and query handlers.

mod convert_referral_invitation;
mod generate_referral_code;
mod get_referral_statistics;
mod process_pending_rewards;
mod send_referral_invitations;
mod validate_referral_code;

// Commands
pub use convert_referral_invitation::{
    ConvertReferralInvitationCommand, ConvertReferralInvitationHandler,
    ConvertReferralInvitationResult,
};
pub use generate_referral_code::{
    GenerateReferralCodeCommand, GenerateReferralCodeHandler, GenerateReferralCodeResult,
    ReferralCodeSettings,
};
pub use process_pending_rewards::{
    ProcessPendingRewardsCommand, ProcessPendingRewardsHandler, ProcessPendingRewardsResult,
    RewardProcessor,
};
pub use send_referral_invitations::{
    InvitationSkipReason, SendReferralInvitationsCommand, SendReferralInvitationsHandler,
    SendReferralInvitationsResult, SkippedInvitation,
};

// Queries
pub use get_referral_statistics::{GetReferralStatisticsHandler, GetReferralStatisticsQuery};
pub use validate_referral_code::{
    ReferralCodeValidation, ValidateReferralCodeHandler, ValidateReferralCodeQuery,
};
