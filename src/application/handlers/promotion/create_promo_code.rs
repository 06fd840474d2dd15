//! CreatePromoCodeHandler - Command handler for issuing a new promo code.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::foundation::{CourseId, Money, Percentage, PromoCodeId, Timestamp};
use crate::domain::promotion::{CodeString, DiscountTerms, PromoCode, UsageLimit, ValidityWindow};
use crate::domain::redemption::RedemptionError;
use crate::ports::{Clock, PromoCodeStore};

/// How the new code discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountInput {
    Percent(Decimal),
    FixedAmount(Decimal),
}

/// Command to create a promo code.
#[derive(Debug, Clone)]
pub struct CreatePromoCodeCommand {
    pub code: String,
    pub description: String,
    pub discount: DiscountInput,
    /// `None` means unlimited.
    pub max_uses: Option<u32>,
    /// Defaults to now.
    pub valid_from: Option<Timestamp>,
    pub valid_to: Option<Timestamp>,
    /// Empty means every course.
    pub applicable_course_ids: Vec<CourseId>,
}

/// Handler for creating promo codes.
pub struct CreatePromoCodeHandler {
    store: Arc<dyn PromoCodeStore>,
    clock: Arc<dyn Clock>,
}

impl CreatePromoCodeHandler {
    pub fn new(store: Arc<dyn PromoCodeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(&self, cmd: CreatePromoCodeCommand) -> Result<PromoCode, RedemptionError> {
        let now = self.clock.now();

        let code = CodeString::try_new(&cmd.code)?;
        let terms = match cmd.discount {
            DiscountInput::Percent(p) => DiscountTerms::Percent(Percentage::try_new(p)?),
            DiscountInput::FixedAmount(a) => DiscountTerms::FixedAmount(Money::try_new(a)?),
        };
        let usage_limit = match cmd.max_uses {
            Some(max) => UsageLimit::capped(max)?,
            None => UsageLimit::Unlimited,
        };
        let window = ValidityWindow::new(cmd.valid_from.unwrap_or(now), cmd.valid_to)?;
        let courses: BTreeSet<CourseId> = cmd.applicable_course_ids.into_iter().collect();

        let promo = PromoCode::create(
            PromoCodeId::new(),
            code,
            cmd.description,
            terms,
            usage_limit,
            window,
            courses,
            now,
        )?;

        self.store.insert(&promo).await?;

        tracing::info!(code = %promo.code, promo_code_id = %promo.id, "promo code created");
        Ok(promo)
    }
}
