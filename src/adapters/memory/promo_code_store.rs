//! In-memory PromoCodeStore.
//!
//! Each code lives behind its own mutex, so redemptions of one code are
//! serialized while different codes proceed in parallel. The map lock is
//! only held long enough to clone the entry handle.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{
    CourseId, DomainError, ErrorCode, PromoCodeId, Timestamp, UserId,
};
use crate::domain::promotion::{CodeString, PromoCode, PromoCodeUsage, PromoRejection};
use crate::ports::{PromoCodeStore, RedeemOutcome, RedemptionRequest};

struct PromoEntry {
    promo: PromoCode,
    usages: Vec<PromoCodeUsage>,
    used_by: HashSet<(UserId, CourseId)>,
}

/// Promo code store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryPromoCodeStore {
    entries: RwLock<HashMap<CodeString, Arc<Mutex<PromoEntry>>>>,
    ids: RwLock<HashMap<PromoCodeId, CodeString>>,
}

impl InMemoryPromoCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, code: &CodeString) -> Option<Arc<Mutex<PromoEntry>>> {
        self.entries.read().await.get(code).cloned()
    }

    async fn entry_by_id(&self, id: &PromoCodeId) -> Option<Arc<Mutex<PromoEntry>>> {
        let code = self.ids.read().await.get(id).cloned()?;
        self.entry(&code).await
    }
}

#[async_trait]
impl PromoCodeStore for InMemoryPromoCodeStore {
    async fn find_by_code(&self, code: &CodeString) -> Result<Option<PromoCode>, DomainError> {
        match self.entry(code).await {
            Some(entry) => Ok(Some(entry.lock().await.promo.clone())),
            None => Ok(None),
        }
    }

    async fn has_usage(
        &self,
        promo_code_id: &PromoCodeId,
        user_id: &UserId,
        course_id: CourseId,
    ) -> Result<bool, DomainError> {
        match self.entry_by_id(promo_code_id).await {
            Some(entry) => Ok(entry
                .lock()
                .await
                .used_by
                .contains(&(user_id.clone(), course_id))),
            None => Ok(false),
        }
    }

    async fn list_active(&self, now: Timestamp) -> Result<Vec<PromoCode>, DomainError> {
        let handles: Vec<_> = self.entries.read().await.values().cloned().collect();
        let mut active = Vec::new();
        for handle in handles {
            let entry = handle.lock().await;
            if entry.promo.is_active && entry.promo.window.contains(now) {
                active.push(entry.promo.clone());
            }
        }
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    async fn insert(&self, promo: &PromoCode) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&promo.code) {
            return Err(DomainError::new(
                ErrorCode::PromoCodeExists,
                format!("Promo code {} already exists", promo.code),
            ));
        }
        entries.insert(
            promo.code.clone(),
            Arc::new(Mutex::new(PromoEntry {
                promo: promo.clone(),
                usages: Vec::new(),
                used_by: HashSet::new(),
            })),
        );
        self.ids.write().await.insert(promo.id, promo.code.clone());
        Ok(())
    }

    async fn deactivate(
        &self,
        code: &CodeString,
        now: Timestamp,
    ) -> Result<Option<PromoCode>, DomainError> {
        match self.entry(code).await {
            Some(entry) => {
                let mut entry = entry.lock().await;
                entry.promo.deactivate(now);
                Ok(Some(entry.promo.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_usages(
        &self,
        promo_code_id: &PromoCodeId,
    ) -> Result<Vec<PromoCodeUsage>, DomainError> {
        match self.entry_by_id(promo_code_id).await {
            Some(entry) => Ok(entry.lock().await.usages.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn redeem(&self, request: &RedemptionRequest) -> Result<RedeemOutcome, DomainError> {
        let handle = match self.entry(&request.code).await {
            Some(handle) => handle,
            None => return Ok(RedeemOutcome::Rejected(PromoRejection::NotFound)),
        };

        let mut entry = handle.lock().await;
        if let Err(reason) = entry.promo.check_redeemable(request.course_id, request.now) {
            return Ok(RedeemOutcome::Rejected(reason));
        }
        let subject = (request.user_id.clone(), request.course_id);
        if entry.used_by.contains(&subject) {
            return Ok(RedeemOutcome::Rejected(PromoRejection::AlreadyUsed));
        }
        if let Err(reason) = entry.promo.consume_use(request.now) {
            return Ok(RedeemOutcome::Rejected(reason));
        }

        let usage = PromoCodeUsage::record(
            &entry.promo,
            request.user_id.clone(),
            request.course_id,
            request.price_at_purchase,
            request.now,
        );
        entry.used_by.insert(subject);
        entry.usages.push(usage.clone());
        Ok(RedeemOutcome::Redeemed(usage))
    }
}
