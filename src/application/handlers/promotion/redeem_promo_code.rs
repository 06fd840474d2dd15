//! RedeemPromoCodeHandler - Command handler that consumes one use of a code.
//!
//! The store runs the check-increment-insert unit atomically. This handler
//! bounds each attempt with the store timeout and retries contention a
//! limited number of times. When retries run out the outcome is decided
//! from fresh state, so callers only ever see a business rejection or an
//! infrastructure failure.

use std::sync::Arc;

use crate::application::StorePolicy;
use crate::domain::foundation::{CourseId, DomainError, ErrorCode, Money, UserId};
use crate::domain::promotion::{
    validate_promo_code, CodeString, PromoCode, PromoCodeUsage, PromoRejection, PromoValidation,
};
use crate::domain::redemption::RedemptionError;
use crate::ports::{Clock, PromoCodeStore, RedeemOutcome, RedemptionRequest};

/// Command to redeem a promo code for a course purchase.
#[derive(Debug, Clone)]
pub struct RedeemPromoCodeCommand {
    pub code: String,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub price: Money,
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemPromoCodeResult {
    pub usage: PromoCodeUsage,
    pub final_price: Money,
}

/// Handler for promo code redemption.
pub struct RedeemPromoCodeHandler {
    store: Arc<dyn PromoCodeStore>,
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
}

impl RedeemPromoCodeHandler {
    pub fn new(store: Arc<dyn PromoCodeStore>, clock: Arc<dyn Clock>, policy: StorePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: RedeemPromoCodeCommand,
    ) -> Result<RedeemPromoCodeResult, RedemptionError> {
        let code = CodeString::try_new(&cmd.code)
            .map_err(|_| RedemptionError::Promo(PromoRejection::NotFound))?;
        let request = RedemptionRequest {
            code,
            user_id: cmd.user_id,
            course_id: cmd.course_id,
            price_at_purchase: cmd.price,
            now: self.clock.now(),
        };

        let mut conflicts = 0u32;
        loop {
            match self.policy.call("redeem", self.store.redeem(&request)).await {
                Ok(RedeemOutcome::Redeemed(usage)) => {
                    tracing::info!(
                        code = %request.code,
                        user_id = %request.user_id,
                        course_id = %request.course_id,
                        discount = %usage.discount_amount,
                        "promo code redeemed"
                    );
                    let final_price = usage.final_price();
                    return Ok(RedeemPromoCodeResult { usage, final_price });
                }
                Ok(RedeemOutcome::Rejected(reason)) => {
                    tracing::info!(
                        code = %request.code,
                        user_id = %request.user_id,
                        reason = reason.reason_code(),
                        "promo redemption rejected"
                    );
                    return Err(reason.into());
                }
                Err(err) if err.code == ErrorCode::StorageConflict => {
                    conflicts += 1;
                    if conflicts > self.policy.max_conflict_retries {
                        tracing::warn!(code = %request.code, conflicts, "conflict retries exhausted");
                        return Err(self.resolve_from_fresh_state(&request).await);
                    }
                    tracing::debug!(code = %request.code, attempt = conflicts, error = %err, "retrying after conflict");
                }
                Err(err) => {
                    tracing::error!(code = %request.code, error = %err, "promo redemption failed");
                    return Err(err.into());
                }
            }
        }
    }

    /// Decides the rejection after contention outlasted the retries.
    ///
    /// Fresh state that still validates means the last use keeps being
    /// taken by others, which is reported as exhausted at the fresh count.
    async fn resolve_from_fresh_state(&self, request: &RedemptionRequest) -> RedemptionError {
        match self.revalidate(request).await {
            Ok((PromoValidation::Invalid(reason), _)) => reason.into(),
            Ok((PromoValidation::Valid { .. }, promo)) => {
                RedemptionError::Promo(PromoRejection::Exhausted {
                    used: promo.as_ref().map_or(0, |p| p.current_uses),
                    max: promo.and_then(|p| p.usage_limit.to_column().map(|m| m as u32)),
                })
            }
            Err(err) => err.into(),
        }
    }

    async fn revalidate(
        &self,
        request: &RedemptionRequest,
    ) -> Result<(PromoValidation, Option<PromoCode>), DomainError> {
        let promo = self
            .policy
            .call("find_by_code", self.store.find_by_code(&request.code))
            .await?;
        let already_used = match &promo {
            Some(p) => {
                self.policy
                    .call(
                        "has_usage",
                        self.store.has_usage(&p.id, &request.user_id, request.course_id),
                    )
                    .await?
            }
            None => false,
        };
        let validation = validate_promo_code(
            promo.as_ref(),
            request.course_id,
            request.now,
            already_used,
        );
        Ok((validation, promo))
    }
}
