//! PromoCodeUsage - the immutable fact of one redemption.

use serde::{Deserialize, Serialize};

use super::{compute_discount, PromoCode};
use crate::domain::foundation::{CourseId, Money, PromoCodeId, PromoUsageId, Timestamp, UserId};

/// One redemption of a promo code by a user for a course.
///
/// At most one usage exists per (promo code, user, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCodeUsage {
    pub id: PromoUsageId,
    pub promo_code_id: PromoCodeId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub price_at_purchase: Money,
    pub discount_amount: Money,
    pub used_at: Timestamp,
}

impl PromoCodeUsage {
    /// Builds the usage record for redeeming `promo` at `price`.
    pub fn record(
        promo: &PromoCode,
        user_id: UserId,
        course_id: CourseId,
        price_at_purchase: Money,
        used_at: Timestamp,
    ) -> Self {
        Self {
            id: PromoUsageId::new(),
            promo_code_id: promo.id,
            user_id,
            course_id,
            price_at_purchase,
            discount_amount: compute_discount(&promo.terms, price_at_purchase),
            used_at,
        }
    }

    /// Price the user pays after the discount.
    pub fn final_price(&self) -> Money {
        self.price_at_purchase.saturating_sub(self.discount_amount)
    }

    /// Key of the uniqueness constraint.
    pub fn subject_key(&self) -> (PromoCodeId, UserId, CourseId) {
        (self.promo_code_id, self.user_id.clone(), self.course_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promotion::promo_code::test_support::save10;

    #[test]
    fn record_computes_discount_from_terms() {
        let now = Timestamp::now();
        let promo = save10(now);
        let usage = PromoCodeUsage::record(
            &promo,
            UserId::new("user-a").unwrap(),
            CourseId::new(5).unwrap(),
            Money::from_minor(20_000),
            now,
        );
        assert_eq!(usage.discount_amount, Money::from_minor(2_000));
        assert_eq!(usage.final_price(), Money::from_minor(18_000));
        assert_eq!(usage.promo_code_id, promo.id);
    }
}
