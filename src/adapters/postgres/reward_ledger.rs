//! PostgreSQL implementation of RewardApplier.
//!
//! Credits go through `credit_ledger`, keyed by reward id, so the balance
//! only moves when the ledger row is new. Course grants are keyed the same
//! way in `course_entitlements`.

use async_trait::async_trait;
use sqlx::PgPool;

use super::errors::map_sqlx_error;
use crate::domain::foundation::DomainError;
use crate::domain::referral::{ReferralReward, RewardKind};
use crate::ports::RewardApplier;

/// PostgreSQL implementation of the RewardApplier port.
pub struct PostgresRewardLedger {
    pool: PgPool,
}

impl PostgresRewardLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardApplier for PostgresRewardLedger {
    async fn apply(&self, reward: &ReferralReward) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin reward delivery", e))?;

        match reward.kind {
            RewardKind::Credit(amount) => {
                let recorded = sqlx::query(
                    r#"
                    INSERT INTO credit_ledger (reward_id, user_id, amount)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (reward_id) DO NOTHING
                    "#,
                )
                .bind(reward.id.as_uuid())
                .bind(reward.user_id.as_str())
                .bind(amount.amount())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("Failed to record credit", e))?
                .rows_affected();

                if recorded == 1 {
                    sqlx::query(
                        r#"
                        INSERT INTO credit_balances (user_id, balance, updated_at)
                        VALUES ($1, $2, NOW())
                        ON CONFLICT (user_id) DO UPDATE
                        SET balance = credit_balances.balance + EXCLUDED.balance,
                            updated_at = NOW()
                        "#,
                    )
                    .bind(reward.user_id.as_str())
                    .bind(amount.amount())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("Failed to update credit balance", e))?;
                }
            }
            RewardKind::FreeCourse(course_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO course_entitlements (user_id, course_id, reward_id)
                    VALUES ($1, $2, $3)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(reward.user_id.as_str())
                .bind(course_id.value())
                .bind(reward.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("Failed to grant course", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit reward delivery", e))?;

        tracing::debug!(
            reward_id = %reward.id,
            user_id = %reward.user_id,
            reward_type = reward.kind.type_name(),
            "reward applied"
        );
        Ok(())
    }
}
