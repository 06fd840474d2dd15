//! Caller-facing redemption errors.
//!
//! Business rejections are ordinary outcomes and carry their typed reason.
//! Infrastructure failures are kept separate so a store outage is never
//! reported as a rejection.
//!
//! | Error | Meaning |
//! |-------|---------|
//! | Promo | Promo code rejected (NOT_FOUND, EXPIRED, EXHAUSTED, ...) |
//! | Referral | Referral code rejected (SELF_REFERRAL, ALREADY_REFERRED, ...) |
//! | NotFound | Some other record is missing |
//! | AlreadyExists | Create hit an existing code |
//! | Forbidden | Caller does not own the resource |
//! | ValidationFailed | Malformed input |
//! | StorageConflict | Contention outside the retrying coordinator |
//! | StorageUnavailable | Store unreachable or timed out; nothing applied |
//! | Infrastructure | Anything else |

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::promotion::PromoRejection;
use crate::domain::referral::ReferralRejection;

/// Errors returned by redemption and referral handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionError {
    /// Promo code rejected for a business reason.
    Promo(PromoRejection),

    /// Referral code rejected for a business reason.
    Referral(ReferralRejection),

    /// A record other than the code itself was not found.
    NotFound(String),

    /// The code being created already exists.
    AlreadyExists(String),

    /// Caller may not act on this resource.
    Forbidden(String),

    /// Input failed validation.
    ValidationFailed { field: String, message: String },

    /// Concurrent-update contention.
    StorageConflict(String),

    /// Store unreachable or timed out.
    StorageUnavailable(String),

    /// Unexpected failure.
    Infrastructure(String),
}

impl RedemptionError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        RedemptionError::Forbidden(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RedemptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        RedemptionError::StorageUnavailable(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RedemptionError::Promo(reason) => reason.reason_code(),
            RedemptionError::Referral(reason) => reason.reason_code(),
            RedemptionError::NotFound(_) => "NOT_FOUND",
            RedemptionError::AlreadyExists(_) => "ALREADY_EXISTS",
            RedemptionError::Forbidden(_) => "FORBIDDEN",
            RedemptionError::ValidationFailed { .. } => "VALIDATION_FAILED",
            RedemptionError::StorageConflict(_) => "STORAGE_CONFLICT",
            RedemptionError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            RedemptionError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            RedemptionError::Promo(reason) => reason.user_message(),
            RedemptionError::Referral(reason) => reason.user_message(),
            RedemptionError::NotFound(what) => format!("Not found: {}", what),
            RedemptionError::AlreadyExists(what) => format!("Already exists: {}", what),
            RedemptionError::Forbidden(msg) => format!("Forbidden: {}", msg),
            RedemptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            RedemptionError::StorageConflict(msg) => format!("Storage conflict: {}", msg),
            RedemptionError::StorageUnavailable(msg) => format!("Storage unavailable: {}", msg),
            RedemptionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// True for business outcomes, false for faults.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RedemptionError::Promo(_) | RedemptionError::Referral(_))
    }

    /// Returns true if the caller may retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedemptionError::StorageConflict(_) | RedemptionError::StorageUnavailable(_)
        )
    }
}

impl std::fmt::Display for RedemptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RedemptionError {}

impl From<PromoRejection> for RedemptionError {
    fn from(reason: PromoRejection) -> Self {
        RedemptionError::Promo(reason)
    }
}

impl From<ReferralRejection> for RedemptionError {
    fn from(reason: ReferralRejection) -> Self {
        RedemptionError::Referral(reason)
    }
}

impl From<ValidationError> for RedemptionError {
    fn from(err: ValidationError) -> Self {
        RedemptionError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for RedemptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => RedemptionError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::RewardNotFound => RedemptionError::NotFound(err.message),
            ErrorCode::PromoCodeExists
            | ErrorCode::ReferralCodeExists
            | ErrorCode::DuplicateInvitation => RedemptionError::AlreadyExists(err.message),
            ErrorCode::StorageConflict => RedemptionError::StorageConflict(err.message),
            ErrorCode::StorageUnavailable => RedemptionError::StorageUnavailable(err.message),
            ErrorCode::DataCorruption | ErrorCode::InternalError => {
                RedemptionError::Infrastructure(err.to_string())
            }
        }
    }
}
