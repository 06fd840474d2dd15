//! GetReferralStatisticsHandler - Query handler for a referrer's numbers.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::redemption::RedemptionError;
use crate::domain::referral::ReferralStatistics;
use crate::ports::ReferralStore;

/// Query for referral statistics.
#[derive(Debug, Clone)]
pub struct GetReferralStatisticsQuery {
    pub user_id: UserId,
}

/// Handler for referral statistics. Figures are derived from source rows
/// on every call.
pub struct GetReferralStatisticsHandler {
    store: Arc<dyn ReferralStore>,
}

impl GetReferralStatisticsHandler {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        query: GetReferralStatisticsQuery,
    ) -> Result<ReferralStatistics, RedemptionError> {
        Ok(self.store.statistics(&query.user_id).await?)
    }
}
