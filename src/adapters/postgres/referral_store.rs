//! PostgreSQL implementation of ReferralStore.
//!
//! Conversion runs in one transaction. The email's pending invitations are
//! locked, the earliest one on a usable code is chosen, its code's
//! `usage_count` is bumped by a conditional update, the invitation flips to
//! converted only if it still is pending, and the reward row is inserted
//! against its one-per-invitation unique key. Partial unique indexes keep
//! one pending invitation per (code, email) and one conversion per email.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::errors::{corrupt_row, is_unique_violation, map_sqlx_error};
use crate::domain::foundation::{
    DomainError, Email, ErrorCode, InvitationId, Money, ReferralCodeId, RewardId, Timestamp,
    UserId,
};
use crate::domain::promotion::{CodeString, UsageLimit};
use crate::domain::referral::{
    choose_invitation, InvitationStatus, ReferralCode, ReferralInvitation, ReferralReward,
    ReferralStatistics, RewardKind, RewardStatus,
};
use crate::ports::{ConversionOutcome, ConversionRequest, ReferralStore};

const CODE_COLUMNS: &str =
    "id, code, owner_id, is_active, usage_count, max_usage, expires_at, created_at";
const INVITATION_COLUMNS: &str = "id, referral_code_id, referrer_id, email, invited_at, \
     registered_at, invitee_user_id, is_converted";
const REWARD_COLUMNS: &str = "id, invitation_id, user_id, reward_type, reward_amount, course_id, \
     is_processed, created_at, processed_at";

/// PostgreSQL implementation of the ReferralStore port.
pub struct PostgresReferralStore {
    pool: PgPool,
}

impl PostgresReferralStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralCodeRow {
    id: Uuid,
    code: String,
    owner_id: String,
    is_active: bool,
    usage_count: i32,
    max_usage: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReferralCodeRow> for ReferralCode {
    type Error = DomainError;

    fn try_from(row: ReferralCodeRow) -> Result<Self, Self::Error> {
        let corrupt = corrupt_row("referral_codes");
        Ok(ReferralCode {
            id: ReferralCodeId::from_uuid(row.id),
            code: CodeString::try_new(&row.code).map_err(&corrupt)?,
            owner: UserId::new(row.owner_id).map_err(&corrupt)?,
            is_active: row.is_active,
            usage_count: u32::try_from(row.usage_count).map_err(|_| {
                DomainError::new(ErrorCode::DataCorruption, "Negative usage_count in referral_codes")
            })?,
            max_usage: UsageLimit::from_column(row.max_usage).map_err(&corrupt)?,
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvitationRow {
    id: Uuid,
    referral_code_id: Uuid,
    referrer_id: String,
    email: String,
    invited_at: DateTime<Utc>,
    registered_at: Option<DateTime<Utc>>,
    invitee_user_id: Option<String>,
    is_converted: bool,
}

impl TryFrom<InvitationRow> for ReferralInvitation {
    type Error = DomainError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let corrupt = corrupt_row("referral_invitations");
        Ok(ReferralInvitation {
            id: InvitationId::from_uuid(row.id),
            referral_code_id: ReferralCodeId::from_uuid(row.referral_code_id),
            referrer: UserId::new(row.referrer_id).map_err(&corrupt)?,
            email: Email::try_new(&row.email).map_err(&corrupt)?,
            invited_at: Timestamp::from_datetime(row.invited_at),
            registered_at: row.registered_at.map(Timestamp::from_datetime),
            invitee_user_id: row
                .invitee_user_id
                .map(UserId::new)
                .transpose()
                .map_err(&corrupt)?,
            status: if row.is_converted {
                InvitationStatus::Converted
            } else {
                InvitationStatus::Pending
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RewardRow {
    id: Uuid,
    invitation_id: Uuid,
    user_id: String,
    reward_type: String,
    reward_amount: Option<Decimal>,
    course_id: Option<i64>,
    is_processed: bool,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RewardRow> for ReferralReward {
    type Error = DomainError;

    fn try_from(row: RewardRow) -> Result<Self, Self::Error> {
        let corrupt = corrupt_row("referral_rewards");
        Ok(ReferralReward {
            id: RewardId::from_uuid(row.id),
            invitation_id: InvitationId::from_uuid(row.invitation_id),
            user_id: UserId::new(row.user_id).map_err(&corrupt)?,
            kind: RewardKind::from_columns(&row.reward_type, row.reward_amount, row.course_id)
                .map_err(&corrupt)?,
            status: if row.is_processed {
                RewardStatus::Processed
            } else {
                RewardStatus::Pending
            },
            created_at: Timestamp::from_datetime(row.created_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
        })
    }
}

impl PostgresReferralStore {
    async fn fetch_code_by_id<'e, E>(
        executor: E,
        id: &ReferralCodeId,
    ) -> Result<Option<ReferralCode>, DomainError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row: Option<ReferralCodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM referral_codes WHERE id = $1",
            CODE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error("Failed to find referral code", e))?;

        row.map(ReferralCode::try_from).transpose()
    }
}

#[async_trait]
impl ReferralStore for PostgresReferralStore {
    async fn find_code(&self, code: &CodeString) -> Result<Option<ReferralCode>, DomainError> {
        let row: Option<ReferralCodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM referral_codes WHERE code = $1",
            CODE_COLUMNS
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find referral code", e))?;

        row.map(ReferralCode::try_from).transpose()
    }

    async fn find_code_by_id(
        &self,
        id: &ReferralCodeId,
    ) -> Result<Option<ReferralCode>, DomainError> {
        Self::fetch_code_by_id(&self.pool, id).await
    }

    async fn find_active_code_for_owner(
        &self,
        owner: &UserId,
        now: Timestamp,
    ) -> Result<Option<ReferralCode>, DomainError> {
        let row: Option<ReferralCodeRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM referral_codes
            WHERE owner_id = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at >= $2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            CODE_COLUMNS
        ))
        .bind(owner.as_str())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find owner's referral code", e))?;

        row.map(ReferralCode::try_from).transpose()
    }

    async fn insert_code(&self, code: &ReferralCode) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO referral_codes (
                id, code, owner_id, is_active, usage_count, max_usage, expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(code.id.as_uuid())
        .bind(code.code.as_str())
        .bind(code.owner.as_str())
        .bind(code.is_active)
        .bind(code.usage_count as i32)
        .bind(code.max_usage.to_column())
        .bind(code.expires_at.map(|t| *t.as_datetime()))
        .bind(code.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "referral_codes_code_key") {
                return DomainError::new(
                    ErrorCode::ReferralCodeExists,
                    format!("Referral code {} already exists", code.code),
                );
            }
            map_sqlx_error("Failed to insert referral code", e)
        })?;

        Ok(())
    }

    async fn has_converted_invitation(&self, email: &Email) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM referral_invitations WHERE email = $1 AND is_converted)",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to check converted invitation", e))
    }

    async fn has_pending_invitation(
        &self,
        referral_code_id: &ReferralCodeId,
        email: &Email,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM referral_invitations
                WHERE referral_code_id = $1 AND email = $2 AND NOT is_converted
            )
            "#,
        )
        .bind(referral_code_id.as_uuid())
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to check pending invitation", e))
    }

    async fn find_pending_invitations(
        &self,
        email: &Email,
    ) -> Result<Vec<ReferralInvitation>, DomainError> {
        let rows: Vec<InvitationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM referral_invitations
            WHERE email = $1 AND NOT is_converted
            ORDER BY invited_at, id
            "#,
            INVITATION_COLUMNS
        ))
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list pending invitations", e))?;

        rows.into_iter().map(ReferralInvitation::try_from).collect()
    }

    async fn insert_invitation(&self, invitation: &ReferralInvitation) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO referral_invitations (
                id, referral_code_id, referrer_id, email, invited_at,
                registered_at, invitee_user_id, is_converted
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invitation.id.as_uuid())
        .bind(invitation.referral_code_id.as_uuid())
        .bind(invitation.referrer.as_str())
        .bind(invitation.email.as_str())
        .bind(invitation.invited_at.as_datetime())
        .bind(invitation.registered_at.map(|t| *t.as_datetime()))
        .bind(invitation.invitee_user_id.as_ref().map(|u| u.as_str().to_string()))
        .bind(invitation.is_converted())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "referral_invitations_pending_key") {
                return DomainError::new(
                    ErrorCode::DuplicateInvitation,
                    format!("{} already has a pending invitation", invitation.email),
                );
            }
            map_sqlx_error("Failed to insert invitation", e)
        })?;

        Ok(())
    }

    async fn convert_invitation(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin conversion", e))?;

        let rows: Vec<InvitationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM referral_invitations
            WHERE email = $1 AND NOT is_converted
            ORDER BY invited_at, id
            FOR UPDATE
            "#,
            INVITATION_COLUMNS
        ))
        .bind(request.email.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to find pending invitations", e))?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            let invitation = ReferralInvitation::try_from(row)?;
            let code_id = invitation.referral_code_id;
            let code = Self::fetch_code_by_id(&mut *tx, &code_id).await?.ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DataCorruption,
                    format!("Invitation references missing referral code {}", code_id),
                )
            })?;
            pending.push((invitation, code));
        }

        let already_converted: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM referral_invitations WHERE email = $1 AND is_converted)",
        )
        .bind(request.email.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to check converted invitation", e))?;

        let mut invitation = match choose_invitation(
            pending.iter().map(|(invitation, code)| (invitation, code)),
            &request.invitee,
            request.now,
            already_converted,
        ) {
            None => return Ok(ConversionOutcome::NoPendingInvitation),
            Some(Err(reason)) => return Ok(ConversionOutcome::Rejected(reason)),
            Some(Ok(invitation)) => invitation.clone(),
        };
        let code_id = invitation.referral_code_id;

        let consumed = sqlx::query(
            r#"
            UPDATE referral_codes
            SET usage_count = usage_count + 1
            WHERE id = $1
              AND is_active
              AND (max_usage IS NULL OR usage_count < max_usage)
              AND (expires_at IS NULL OR expires_at >= $2)
            "#,
        )
        .bind(code_id.as_uuid())
        .bind(request.now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to consume referral use", e))?
        .rows_affected();

        // The code changed after it was read; a retry re-chooses from fresh rows.
        if consumed == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("Failed to roll back conversion", e))?;
            return Err(DomainError::conflict(format!(
                "Referral code {} changed during conversion",
                code_id
            )));
        }

        invitation.convert(request.invitee.clone(), request.now)?;
        let flipped = sqlx::query(
            r#"
            UPDATE referral_invitations
            SET is_converted = TRUE, registered_at = $2, invitee_user_id = $3
            WHERE id = $1 AND NOT is_converted
            "#,
        )
        .bind(invitation.id.as_uuid())
        .bind(request.now.as_datetime())
        .bind(request.invitee.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "referral_invitations_converted_key") {
                return DomainError::conflict(format!(
                    "{} converted concurrently",
                    request.email
                ));
            }
            map_sqlx_error("Failed to mark invitation converted", e)
        })?
        .rows_affected();

        if flipped == 0 {
            return Err(DomainError::conflict(format!(
                "Invitation {} converted concurrently",
                invitation.id
            )));
        }

        let reward = request.policy.reward_for(&invitation, request.now);
        let (amount, course_id) = reward.kind.to_columns();
        sqlx::query(
            r#"
            INSERT INTO referral_rewards (
                id, invitation_id, user_id, reward_type, reward_amount, course_id,
                is_processed, created_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, NULL)
            "#,
        )
        .bind(reward.id.as_uuid())
        .bind(reward.invitation_id.as_uuid())
        .bind(reward.user_id.as_str())
        .bind(reward.kind.type_name())
        .bind(amount)
        .bind(course_id)
        .bind(reward.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert referral reward", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit conversion", e))?;

        Ok(ConversionOutcome::Converted { invitation, reward })
    }

    async fn find_unprocessed_rewards(&self, limit: u32) -> Result<Vec<ReferralReward>, DomainError> {
        let rows: Vec<RewardRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM referral_rewards
            WHERE NOT is_processed
            ORDER BY created_at, id
            LIMIT $1
            "#,
            REWARD_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list unprocessed rewards", e))?;

        rows.into_iter().map(ReferralReward::try_from).collect()
    }

    async fn mark_reward_processed(&self, id: &RewardId, now: Timestamp) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE referral_rewards
            SET is_processed = TRUE, processed_at = $2
            WHERE id = $1 AND NOT is_processed
            "#,
        )
        .bind(id.as_uuid())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to mark reward processed", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn statistics(&self, referrer: &UserId) -> Result<ReferralStatistics, DomainError> {
        let (total, converted): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_converted)
            FROM referral_invitations
            WHERE referrer_id = $1
            "#,
        )
        .bind(referrer.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to count invitations", e))?;

        let credit: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(reward_amount), 0)
            FROM referral_rewards
            WHERE user_id = $1 AND reward_type = $2 AND is_processed
            "#,
        )
        .bind(referrer.as_str())
        .bind(RewardKind::CREDIT)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to sum credit rewards", e))?;

        let credit = Money::try_new(credit).map_err(corrupt_row("referral_rewards"))?;
        Ok(ReferralStatistics::from_counts(
            total.max(0) as u64,
            converted.max(0) as u64,
            credit,
        ))
    }
}
