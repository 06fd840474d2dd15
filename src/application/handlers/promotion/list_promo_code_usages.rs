//! ListPromoCodeUsagesHandler - Query handler for a code's redemption history.

use std::sync::Arc;

use crate::domain::promotion::{CodeString, PromoCodeUsage, PromoRejection};
use crate::domain::redemption::RedemptionError;
use crate::ports::PromoCodeStore;

/// Query for every usage of a promo code.
#[derive(Debug, Clone)]
pub struct ListPromoCodeUsagesQuery {
    pub code: String,
}

/// Handler returning usages oldest first.
pub struct ListPromoCodeUsagesHandler {
    store: Arc<dyn PromoCodeStore>,
}

impl ListPromoCodeUsagesHandler {
    pub fn new(store: Arc<dyn PromoCodeStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        query: ListPromoCodeUsagesQuery,
    ) -> Result<Vec<PromoCodeUsage>, RedemptionError> {
        let code = CodeString::try_new(&query.code)
            .map_err(|_| RedemptionError::Promo(PromoRejection::NotFound))?;
        let promo = self
            .store
            .find_by_code(&code)
            .await?
            .ok_or(RedemptionError::Promo(PromoRejection::NotFound))?;

        let mut usages = self.store.list_usages(&promo.id).await?;
        usages.sort_by_key(|u| u.used_at);
        Ok(usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryPromoCodeStore;
    use crate::domain::foundation::{CourseId, Money, Timestamp, UserId};
    use crate::domain::promotion::promo_code::test_support::save10;
    use crate::ports::{RedeemOutcome, RedemptionRequest};

    #[tokio::test]
    async fn lists_recorded_usages() {
        let now = Timestamp::now();
        let store = Arc::new(InMemoryPromoCodeStore::new());
        let promo = save10(now);
        store.insert(&promo).await.unwrap();
        let outcome = store
            .redeem(&RedemptionRequest {
                code: promo.code.clone(),
                user_id: UserId::new("user-a").unwrap(),
                course_id: CourseId::new(5).unwrap(),
                price_at_purchase: Money::from_minor(20_000),
                now,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RedeemOutcome::Redeemed(_)));

        let handler = ListPromoCodeUsagesHandler::new(store);
        let usages = handler
            .handle(ListPromoCodeUsagesQuery { code: "SAVE10".to_string() })
            .await
            .unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].discount_amount, Money::from_minor(2_000));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let handler = ListPromoCodeUsagesHandler::new(Arc::new(InMemoryPromoCodeStore::new()));
        let err = handler
            .handle(ListPromoCodeUsagesQuery { code: "MISSING".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err, RedemptionError::Promo(PromoRejection::NotFound));
    }
}
