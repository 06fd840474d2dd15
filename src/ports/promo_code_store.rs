//! Promo code store port.
//!
//! Durable records for promo codes and their usage facts.
//!
//! # Design
//!
//! - **Single writer of counters**: `current_uses` changes only through
//!   [`PromoCodeStore::redeem`]
//! - **Atomic unit**: `redeem` re-checks the code, consumes one use and
//!   inserts the usage row together or not at all
//! - **Uniqueness**: at most one usage per (promo code, user, course)

use async_trait::async_trait;

use crate::domain::foundation::{CourseId, DomainError, Money, PromoCodeId, Timestamp, UserId};
use crate::domain::promotion::{CodeString, PromoCode, PromoCodeUsage, PromoRejection};

/// One attempt to redeem a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionRequest {
    pub code: CodeString,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub price_at_purchase: Money,
    pub now: Timestamp,
}

/// What the atomic unit decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// One use consumed and the usage row written.
    Redeemed(PromoCodeUsage),
    /// Nothing written.
    Rejected(PromoRejection),
}

/// Repository port for promo codes and usages.
#[async_trait]
pub trait PromoCodeStore: Send + Sync {
    /// Point lookup by code string.
    async fn find_by_code(&self, code: &CodeString) -> Result<Option<PromoCode>, DomainError>;

    /// True if a usage exists for the (code, user, course) triple.
    async fn has_usage(
        &self,
        promo_code_id: &PromoCodeId,
        user_id: &UserId,
        course_id: CourseId,
    ) -> Result<bool, DomainError>;

    /// Active codes whose validity window contains `now`.
    async fn list_active(&self, now: Timestamp) -> Result<Vec<PromoCode>, DomainError>;

    /// Insert a new code.
    ///
    /// # Errors
    ///
    /// - `PromoCodeExists` if the code string is taken
    async fn insert(&self, promo: &PromoCode) -> Result<(), DomainError>;

    /// Switch a code off. Returns the updated code, or `None` if missing.
    async fn deactivate(
        &self,
        code: &CodeString,
        now: Timestamp,
    ) -> Result<Option<PromoCode>, DomainError>;

    /// Usage facts for one code, oldest first.
    async fn list_usages(&self, promo_code_id: &PromoCodeId)
        -> Result<Vec<PromoCodeUsage>, DomainError>;

    /// Redeem one use atomically.
    ///
    /// Business rejections come back as `Ok(Rejected(_))`.
    ///
    /// # Errors
    ///
    /// - `StorageConflict` on contention; nothing was applied and the call
    ///   may be retried
    /// - `StorageUnavailable` when the store cannot be reached
    async fn redeem(&self, request: &RedemptionRequest) -> Result<RedeemOutcome, DomainError>;
}
