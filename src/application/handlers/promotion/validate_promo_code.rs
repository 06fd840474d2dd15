//! ValidatePromoCodeHandler - Query handler for checking a promo code.
//!
//! Pure read. Counters are never touched, so callers may validate as often
//! as they like (e.g. to render checkout state).

use std::sync::Arc;

use crate::domain::foundation::{CourseId, UserId};
use crate::domain::promotion::{validate_promo_code, CodeString, PromoRejection, PromoValidation};
use crate::domain::redemption::RedemptionError;
use crate::ports::{Clock, PromoCodeStore};

/// Query to validate a promo code for a user and course.
#[derive(Debug, Clone)]
pub struct ValidatePromoCodeQuery {
    pub code: String,
    pub user_id: UserId,
    pub course_id: CourseId,
}

/// Handler for promo code validation.
pub struct ValidatePromoCodeHandler {
    store: Arc<dyn PromoCodeStore>,
    clock: Arc<dyn Clock>,
}

impl ValidatePromoCodeHandler {
    pub fn new(store: Arc<dyn PromoCodeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(
        &self,
        query: ValidatePromoCodeQuery,
    ) -> Result<PromoValidation, RedemptionError> {
        // A code that cannot be well-formed cannot exist either.
        let code = match CodeString::try_new(&query.code) {
            Ok(code) => code,
            Err(_) => return Ok(PromoValidation::Invalid(PromoRejection::NotFound)),
        };
        let now = self.clock.now();

        let promo = self.store.find_by_code(&code).await?;
        let already_used = match &promo {
            Some(p) if p.check_redeemable(query.course_id, now).is_ok() => {
                self.store
                    .has_usage(&p.id, &query.user_id, query.course_id)
                    .await?
            }
            _ => false,
        };

        let validation = validate_promo_code(promo.as_ref(), query.course_id, now, already_used);
        if let PromoValidation::Invalid(reason) = &validation {
            tracing::debug!(code = %code, user_id = %query.user_id, reason = reason.reason_code(), "promo code rejected");
        }
        Ok(validation)
    }
}
