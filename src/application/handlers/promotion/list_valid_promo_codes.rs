//! ListValidPromoCodesHandler - Query handler for codes a course can use now.

use std::sync::Arc;

use crate::domain::foundation::CourseId;
use crate::domain::promotion::PromoCode;
use crate::domain::redemption::RedemptionError;
use crate::ports::{Clock, PromoCodeStore};

/// Query for promo codes currently redeemable.
#[derive(Debug, Clone, Default)]
pub struct ListValidPromoCodesQuery {
    /// Restricts the list to codes applicable to this course.
    pub course_id: Option<CourseId>,
}

/// Handler listing active, in-window, non-exhausted codes.
pub struct ListValidPromoCodesHandler {
    store: Arc<dyn PromoCodeStore>,
    clock: Arc<dyn Clock>,
}

impl ListValidPromoCodesHandler {
    pub fn new(store: Arc<dyn PromoCodeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(
        &self,
        query: ListValidPromoCodesQuery,
    ) -> Result<Vec<PromoCode>, RedemptionError> {
        let now = self.clock.now();
        let codes = self.store.list_active(now).await?;

        Ok(codes
            .into_iter()
            .filter(|p| p.is_active && p.window.contains(now) && !p.is_exhausted())
            .filter(|p| query.course_id.map_or(true, |course| p.applies_to(course)))
            .collect())
    }
}
