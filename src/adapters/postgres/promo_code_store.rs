//! PostgreSQL implementation of PromoCodeStore.
//!
//! Redemption runs in one transaction: the usage row is inserted against
//! the `(promo_code_id, user_id, course_id)` unique key, then `current_uses`
//! is bumped by a conditional update that only matches while the code is
//! still redeemable. The affected-row counts decide the outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use sqlx::PgPool;
use uuid::Uuid;

use super::errors::{corrupt_row, is_unique_violation, map_sqlx_error};
use crate::domain::foundation::{
    CourseId, DomainError, ErrorCode, Money, PromoCodeId, PromoUsageId, Timestamp, UserId,
};
use crate::domain::promotion::{
    CodeString, DiscountTerms, PromoCode, PromoCodeUsage, PromoRejection, UsageLimit,
    ValidityWindow,
};
use crate::ports::{PromoCodeStore, RedeemOutcome, RedemptionRequest};

const PROMO_COLUMNS: &str = r#"
    id, code, description, discount_percent, discount_amount, is_active,
    max_uses, current_uses, valid_from, valid_to, applicable_course_ids,
    created_at, updated_at
"#;

/// PostgreSQL implementation of the PromoCodeStore port.
pub struct PostgresPromoCodeStore {
    pool: PgPool,
}

impl PostgresPromoCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a promo code.
#[derive(Debug, sqlx::FromRow)]
struct PromoCodeRow {
    id: Uuid,
    code: String,
    description: String,
    discount_percent: Option<Decimal>,
    discount_amount: Option<Decimal>,
    is_active: bool,
    max_uses: Option<i32>,
    current_uses: i32,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    applicable_course_ids: Vec<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PromoCodeRow> for PromoCode {
    type Error = DomainError;

    fn try_from(row: PromoCodeRow) -> Result<Self, Self::Error> {
        let corrupt = corrupt_row("promo_codes");
        let applicable_course_ids = row
            .applicable_course_ids
            .into_iter()
            .map(CourseId::new)
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(&corrupt)?;
        let current_uses = u32::try_from(row.current_uses).map_err(|_| {
            DomainError::new(ErrorCode::DataCorruption, "Negative current_uses in promo_codes")
        })?;

        Ok(PromoCode {
            id: PromoCodeId::from_uuid(row.id),
            code: CodeString::try_new(&row.code).map_err(&corrupt)?,
            description: row.description,
            terms: DiscountTerms::from_columns(row.discount_percent, row.discount_amount)
                .map_err(&corrupt)?,
            is_active: row.is_active,
            usage_limit: UsageLimit::from_column(row.max_uses).map_err(&corrupt)?,
            current_uses,
            window: ValidityWindow::new(
                Timestamp::from_datetime(row.valid_from),
                row.valid_to.map(Timestamp::from_datetime),
            )
            .map_err(&corrupt)?,
            applicable_course_ids,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// Database row representation of a usage.
#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    id: Uuid,
    promo_code_id: Uuid,
    user_id: String,
    course_id: i64,
    price_at_purchase: Decimal,
    discount_amount: Decimal,
    used_at: DateTime<Utc>,
}

impl TryFrom<UsageRow> for PromoCodeUsage {
    type Error = DomainError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        let corrupt = corrupt_row("promo_code_usages");
        Ok(PromoCodeUsage {
            id: PromoUsageId::from_uuid(row.id),
            promo_code_id: PromoCodeId::from_uuid(row.promo_code_id),
            user_id: UserId::new(row.user_id).map_err(&corrupt)?,
            course_id: CourseId::new(row.course_id).map_err(&corrupt)?,
            price_at_purchase: Money::try_new(row.price_at_purchase).map_err(&corrupt)?,
            discount_amount: Money::try_new(row.discount_amount).map_err(&corrupt)?,
            used_at: Timestamp::from_datetime(row.used_at),
        })
    }
}

impl PostgresPromoCodeStore {
    async fn fetch_by_code<'e, E>(executor: E, code: &CodeString) -> Result<Option<PromoCode>, DomainError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row: Option<PromoCodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM promo_codes WHERE code = $1",
            PROMO_COLUMNS
        ))
        .bind(code.as_str())
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error("Failed to find promo code", e))?;

        row.map(PromoCode::try_from).transpose()
    }

    /// Re-reads the code after the conditional update matched nothing.
    ///
    /// A fresh rejection is final; a code that still looks redeemable means
    /// it changed under us, which the caller retries as a conflict.
    async fn classify_miss(&self, request: &RedemptionRequest) -> Result<RedeemOutcome, DomainError> {
        match Self::fetch_by_code(&self.pool, &request.code).await? {
            None => Ok(RedeemOutcome::Rejected(PromoRejection::NotFound)),
            Some(fresh) => match fresh.check_redeemable(request.course_id, request.now) {
                Err(reason) => Ok(RedeemOutcome::Rejected(reason)),
                Ok(()) => Err(DomainError::conflict(format!(
                    "Promo code {} changed during redemption",
                    request.code
                ))),
            },
        }
    }
}

#[async_trait]
impl PromoCodeStore for PostgresPromoCodeStore {
    async fn find_by_code(&self, code: &CodeString) -> Result<Option<PromoCode>, DomainError> {
        Self::fetch_by_code(&self.pool, code).await
    }

    async fn has_usage(
        &self,
        promo_code_id: &PromoCodeId,
        user_id: &UserId,
        course_id: CourseId,
    ) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM promo_code_usages
                WHERE promo_code_id = $1 AND user_id = $2 AND course_id = $3
            )
            "#,
        )
        .bind(promo_code_id.as_uuid())
        .bind(user_id.as_str())
        .bind(course_id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to check promo usage", e))?;

        Ok(exists)
    }

    async fn list_active(&self, now: Timestamp) -> Result<Vec<PromoCode>, DomainError> {
        let rows: Vec<PromoCodeRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM promo_codes
            WHERE is_active
              AND valid_from <= $1
              AND (valid_to IS NULL OR valid_to >= $1)
            ORDER BY code
            "#,
            PROMO_COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list active promo codes", e))?;

        rows.into_iter().map(PromoCode::try_from).collect()
    }

    async fn insert(&self, promo: &PromoCode) -> Result<(), DomainError> {
        let (percent, amount) = promo.terms.to_columns();
        let course_ids: Vec<i64> = promo.applicable_course_ids.iter().map(|c| c.value()).collect();

        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                id, code, description, discount_percent, discount_amount, is_active,
                max_uses, current_uses, valid_from, valid_to, applicable_course_ids,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(promo.id.as_uuid())
        .bind(promo.code.as_str())
        .bind(&promo.description)
        .bind(percent)
        .bind(amount)
        .bind(promo.is_active)
        .bind(promo.usage_limit.to_column())
        .bind(promo.current_uses as i32)
        .bind(promo.window.valid_from.as_datetime())
        .bind(promo.window.valid_to.map(|t| *t.as_datetime()))
        .bind(course_ids)
        .bind(promo.created_at.as_datetime())
        .bind(promo.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "promo_codes_code_key") {
                return DomainError::new(
                    ErrorCode::PromoCodeExists,
                    format!("Promo code {} already exists", promo.code),
                );
            }
            map_sqlx_error("Failed to insert promo code", e)
        })?;

        Ok(())
    }

    async fn deactivate(
        &self,
        code: &CodeString,
        now: Timestamp,
    ) -> Result<Option<PromoCode>, DomainError> {
        let row: Option<PromoCodeRow> = sqlx::query_as(&format!(
            r#"
            UPDATE promo_codes
            SET is_active = FALSE,
                updated_at = CASE WHEN is_active THEN $2 ELSE updated_at END
            WHERE code = $1
            RETURNING {}
            "#,
            PROMO_COLUMNS
        ))
        .bind(code.as_str())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to deactivate promo code", e))?;

        row.map(PromoCode::try_from).transpose()
    }

    async fn list_usages(
        &self,
        promo_code_id: &PromoCodeId,
    ) -> Result<Vec<PromoCodeUsage>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT id, promo_code_id, user_id, course_id, price_at_purchase,
                   discount_amount, used_at
            FROM promo_code_usages
            WHERE promo_code_id = $1
            ORDER BY used_at, id
            "#,
        )
        .bind(promo_code_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list promo usages", e))?;

        rows.into_iter().map(PromoCodeUsage::try_from).collect()
    }

    async fn redeem(&self, request: &RedemptionRequest) -> Result<RedeemOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin redemption", e))?;

        let promo = match Self::fetch_by_code(&mut *tx, &request.code).await? {
            Some(promo) => promo,
            None => return Ok(RedeemOutcome::Rejected(PromoRejection::NotFound)),
        };
        if let Err(reason) = promo.check_redeemable(request.course_id, request.now) {
            return Ok(RedeemOutcome::Rejected(reason));
        }

        let usage = PromoCodeUsage::record(
            &promo,
            request.user_id.clone(),
            request.course_id,
            request.price_at_purchase,
            request.now,
        );

        // Blocks on a concurrent insert of the same subject until it settles.
        let inserted = sqlx::query(
            r#"
            INSERT INTO promo_code_usages (
                id, promo_code_id, user_id, course_id, price_at_purchase,
                discount_amount, used_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (promo_code_id, user_id, course_id) DO NOTHING
            "#,
        )
        .bind(usage.id.as_uuid())
        .bind(usage.promo_code_id.as_uuid())
        .bind(usage.user_id.as_str())
        .bind(usage.course_id.value())
        .bind(usage.price_at_purchase.amount())
        .bind(usage.discount_amount.amount())
        .bind(usage.used_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert promo usage", e))?
        .rows_affected();

        if inserted == 0 {
            return Ok(RedeemOutcome::Rejected(PromoRejection::AlreadyUsed));
        }

        let updated = sqlx::query(
            r#"
            UPDATE promo_codes
            SET current_uses = current_uses + 1, updated_at = $2
            WHERE id = $1
              AND is_active
              AND (max_uses IS NULL OR current_uses < max_uses)
              AND valid_from <= $2
              AND (valid_to IS NULL OR valid_to >= $2)
            "#,
        )
        .bind(promo.id.as_uuid())
        .bind(request.now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to consume promo use", e))?
        .rows_affected();

        if updated == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("Failed to roll back redemption", e))?;
            return self.classify_miss(request).await;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit redemption", e))?;

        tracing::debug!(
            code = %request.code,
            user_id = %request.user_id,
            course_id = %request.course_id,
            "promo use consumed"
        );
        Ok(RedeemOutcome::Redeemed(usage))
    }
}
