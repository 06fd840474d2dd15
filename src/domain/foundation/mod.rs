//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the redemption domain.

mod email;
mod errors;
mod ids;
mod money;
mod percentage;
mod state_machine;
mod timestamp;

pub use email::Email;
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CourseId, InvitationId, PromoCodeId, PromoUsageId, ReferralCodeId, RewardId, UserId};
pub use money::{Money, MONEY_SCALE};
pub use percentage::Percentage;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
