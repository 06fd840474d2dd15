//! DeactivatePromoCodeHandler - Command handler that switches a code off.
//!
//! Counters and past usages are kept; only future redemptions stop.

use std::sync::Arc;

use crate::domain::promotion::{CodeString, PromoCode, PromoRejection};
use crate::domain::redemption::RedemptionError;
use crate::ports::{Clock, PromoCodeStore};

/// Command to deactivate a promo code.
#[derive(Debug, Clone)]
pub struct DeactivatePromoCodeCommand {
    pub code: String,
}

/// Handler for deactivating promo codes.
pub struct DeactivatePromoCodeHandler {
    store: Arc<dyn PromoCodeStore>,
    clock: Arc<dyn Clock>,
}

impl DeactivatePromoCodeHandler {
    pub fn new(store: Arc<dyn PromoCodeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(&self, cmd: DeactivatePromoCodeCommand) -> Result<PromoCode, RedemptionError> {
        let code = CodeString::try_new(&cmd.code)
            .map_err(|_| RedemptionError::Promo(PromoRejection::NotFound))?;

        let promo = self
            .store
            .deactivate(&code, self.clock.now())
            .await?
            .ok_or(RedemptionError::Promo(PromoRejection::NotFound))?;

        tracing::info!(code = %promo.code, uses = promo.current_uses, "promo code deactivated");
        Ok(promo)
    }
}
