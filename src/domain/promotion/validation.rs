//! Promo code validation.
//!
//! Validation is a pure read: it decides whether a code is redeemable for a
//! (user, course) pair right now and never touches counters, so it can be
//! called any number of times.

use serde::{Deserialize, Serialize};

use super::{DiscountTerms, PromoCode};
use crate::domain::foundation::{CourseId, PromoCodeId, Timestamp};

/// Why a promo code cannot be redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromoRejection {
    /// Code does not exist.
    NotFound,

    /// Code has been switched off.
    Inactive,

    /// The validity window has closed.
    Expired { expired_at: Timestamp },

    /// The validity window has not opened yet.
    NotYetValid { valid_from: Timestamp },

    /// Code is restricted to other courses.
    NotApplicable { course_id: CourseId },

    /// Every use has been consumed.
    Exhausted { used: u32, max: Option<u32> },

    /// This user already redeemed this code for this course.
    AlreadyUsed,
}

impl PromoRejection {
    /// Stable machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            PromoRejection::NotFound => "NOT_FOUND",
            PromoRejection::Inactive => "INACTIVE",
            PromoRejection::Expired { .. } => "EXPIRED",
            PromoRejection::NotYetValid { .. } => "NOT_YET_VALID",
            PromoRejection::NotApplicable { .. } => "NOT_APPLICABLE",
            PromoRejection::Exhausted { .. } => "EXHAUSTED",
            PromoRejection::AlreadyUsed => "ALREADY_USED",
        }
    }

    /// Get a user-facing message for the rejection.
    pub fn user_message(&self) -> String {
        match self {
            PromoRejection::NotFound => {
                "This promo code was not found. Please check and try again.".to_string()
            }
            PromoRejection::Inactive => "This promo code is no longer valid.".to_string(),
            PromoRejection::Expired { expired_at } => {
                format!("This promo code expired on {}.", expired_at)
            }
            PromoRejection::NotYetValid { valid_from } => {
                format!("This promo code is not valid until {}.", valid_from)
            }
            PromoRejection::NotApplicable { course_id } => {
                format!("This promo code cannot be used for course {}.", course_id)
            }
            PromoRejection::Exhausted { used, max } => match max {
                Some(max) => format!(
                    "This promo code has been fully redeemed ({}/{} uses).",
                    used, max
                ),
                None => "This promo code has been fully redeemed.".to_string(),
            },
            PromoRejection::AlreadyUsed => {
                "You have already used this promo code for this course.".to_string()
            }
        }
    }
}

impl std::fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

/// Result of validating a promo code for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoValidation {
    /// Code is redeemable with these terms.
    Valid {
        promo_code_id: PromoCodeId,
        terms: DiscountTerms,
    },
    /// Code is rejected for the specified reason.
    Invalid(PromoRejection),
}

impl PromoValidation {
    /// Returns true if the code is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, PromoValidation::Valid { .. })
    }

    /// Converts to a Result, with invalid becoming an error.
    pub fn into_result(self) -> Result<(PromoCodeId, DiscountTerms), PromoRejection> {
        match self {
            PromoValidation::Valid {
                promo_code_id,
                terms,
            } => Ok((promo_code_id, terms)),
            PromoValidation::Invalid(reason) => Err(reason),
        }
    }
}

/// Decides whether `promo` is redeemable for the subject at `now`.
///
/// Checks run in order and stop at the first failure: exists, active,
/// window, course applicability, remaining uses, prior usage.
pub fn validate_promo_code(
    promo: Option<&PromoCode>,
    course_id: CourseId,
    now: Timestamp,
    already_used: bool,
) -> PromoValidation {
    let promo = match promo {
        Some(p) => p,
        None => return PromoValidation::Invalid(PromoRejection::NotFound),
    };

    if let Err(reason) = promo.check_redeemable(course_id, now) {
        return PromoValidation::Invalid(reason);
    }

    if already_used {
        return PromoValidation::Invalid(PromoRejection::AlreadyUsed);
    }

    PromoValidation::Valid {
        promo_code_id: promo.id,
        terms: promo.terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promotion::promo_code::test_support::save10;

    fn course(id: i64) -> CourseId {
        CourseId::new(id).unwrap()
    }

    #[test]
    fn missing_code_is_not_found() {
        let result = validate_promo_code(None, course(5), Timestamp::now(), false);
        assert_eq!(result, PromoValidation::Invalid(PromoRejection::NotFound));
    }

    #[test]
    fn valid_code_returns_terms() {
        let now = Timestamp::now();
        let promo = save10(now);
        let result = validate_promo_code(Some(&promo), course(5), now, false);
        assert_eq!(
            result,
            PromoValidation::Valid {
                promo_code_id: promo.id,
                terms: promo.terms,
            }
        );
    }

    #[test]
    fn expired_code_rejected_even_with_uses_left() {
        let now = Timestamp::now();
        let promo = save10(now);
        let later = now.add_days(45);
        assert!(matches!(
            validate_promo_code(Some(&promo), course(5), later, false),
            PromoValidation::Invalid(PromoRejection::Expired { .. })
        ));
    }

    #[test]
    fn exhausted_is_reported_before_already_used() {
        let now = Timestamp::now();
        let mut promo = save10(now);
        promo.consume_use(now).unwrap();
        assert!(matches!(
            validate_promo_code(Some(&promo), course(5), now, true),
            PromoValidation::Invalid(PromoRejection::Exhausted { .. })
        ));
    }

    #[test]
    fn prior_usage_is_already_used() {
        let now = Timestamp::now();
        let promo = save10(now);
        assert_eq!(
            validate_promo_code(Some(&promo), course(5), now, true),
            PromoValidation::Invalid(PromoRejection::AlreadyUsed)
        );
    }

    #[test]
    fn validation_does_not_mutate_counters() {
        let now = Timestamp::now();
        let promo = save10(now);
        for _ in 0..5 {
            assert!(validate_promo_code(Some(&promo), course(5), now, false).is_valid());
        }
        assert_eq!(promo.current_uses, 0);
    }

    #[test]
    fn reason_codes_are_distinct() {
        let now = Timestamp::now();
        let reasons = [
            PromoRejection::NotFound,
            PromoRejection::Inactive,
            PromoRejection::Expired { expired_at: now },
            PromoRejection::NotYetValid { valid_from: now },
            PromoRejection::NotApplicable { course_id: course(1) },
            PromoRejection::Exhausted { used: 1, max: Some(1) },
            PromoRejection::AlreadyUsed,
        ];
        let codes: std::collections::HashSet<_> = reasons.iter().map(|r| r.reason_code()).collect();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn rejection_serializes_with_type_tag() {
        let reason = PromoRejection::Exhausted { used: 50, max: Some(50) };
        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("\"type\":\"exhausted\""));
        assert!(json.contains("\"used\":50"));
    }
}
