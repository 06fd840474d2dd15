//! ValidateReferralCodeHandler - Query handler for checking a referral code.

use std::sync::Arc;

use crate::domain::foundation::{Email, ReferralCodeId, UserId};
use crate::domain::promotion::CodeString;
use crate::domain::redemption::RedemptionError;
use crate::domain::referral::{validate_referral_code, ReferralRejection};
use crate::ports::{Clock, ReferralStore};

/// Query to validate a referral code for a prospective invitee.
#[derive(Debug, Clone)]
pub struct ValidateReferralCodeQuery {
    pub code: String,
    pub candidate: UserId,
    /// When present, an earlier conversion of this email rejects the code.
    pub candidate_email: Option<String>,
}

/// Outcome of referral code validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralCodeValidation {
    Valid {
        referral_code_id: ReferralCodeId,
        referrer: UserId,
    },
    Invalid(ReferralRejection),
}

impl ReferralCodeValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, ReferralCodeValidation::Valid { .. })
    }
}

/// Handler for referral code validation.
pub struct ValidateReferralCodeHandler {
    store: Arc<dyn ReferralStore>,
    clock: Arc<dyn Clock>,
}

impl ValidateReferralCodeHandler {
    pub fn new(store: Arc<dyn ReferralStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(
        &self,
        query: ValidateReferralCodeQuery,
    ) -> Result<ReferralCodeValidation, RedemptionError> {
        let code = match CodeString::try_new(&query.code) {
            Ok(code) => code,
            Err(_) => return Ok(ReferralCodeValidation::Invalid(ReferralRejection::NotFound)),
        };
        let email = query
            .candidate_email
            .as_deref()
            .map(Email::try_new)
            .transpose()?;

        let referral_code = self.store.find_code(&code).await?;
        let already_converted = match &email {
            Some(email) => self.store.has_converted_invitation(email).await?,
            None => false,
        };

        let verdict = validate_referral_code(
            referral_code.as_ref(),
            &query.candidate,
            self.clock.now(),
            already_converted,
        );
        Ok(match (verdict, referral_code) {
            (Ok(()), Some(rc)) => ReferralCodeValidation::Valid {
                referral_code_id: rc.id,
                referrer: rc.owner,
            },
            (Err(reason), _) => {
                tracing::debug!(code = %code, candidate = %query.candidate, reason = reason.reason_code(), "referral code rejected");
                ReferralCodeValidation::Invalid(reason)
            }
            (Ok(()), None) => ReferralCodeValidation::Invalid(ReferralRejection::NotFound),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixedClock, InMemoryReferralStore};
    use crate::domain::foundation::{Money, Timestamp};
    use crate::domain::promotion::UsageLimit;
    use crate::domain::referral::{ReferralCode, ReferralInvitation, RewardKind, RewardPolicy};
    use crate::ports::ConversionRequest;

    async fn setup(now: Timestamp) -> (Arc<InMemoryReferralStore>, ValidateReferralCodeHandler) {
        let store = Arc::new(InMemoryReferralStore::new());
        store
            .insert_code(&ReferralCode::create(
                ReferralCodeId::new(),
                CodeString::try_new("REF-AAAA1111").unwrap(),
                UserId::new("referrer").unwrap(),
                UsageLimit::Unlimited,
                None,
                now.minus_days(1),
            ))
            .await
            .unwrap();
        let handler = ValidateReferralCodeHandler::new(store.clone(), Arc::new(FixedClock::new(now)));
        (store, handler)
    }

    fn query(candidate: &str, email: Option<&str>) -> ValidateReferralCodeQuery {
        ValidateReferralCodeQuery {
            code: "ref-aaaa1111".to_string(),
            candidate: UserId::new(candidate).unwrap(),
            candidate_email: email.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn valid_for_someone_else() {
        let (_, handler) = setup(Timestamp::now()).await;
        let result = handler.handle(query("friend", None)).await.unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn owner_gets_self_referral() {
        let (_, handler) = setup(Timestamp::now()).await;
        let result = handler.handle(query("referrer", None)).await.unwrap();
        assert_eq!(result, ReferralCodeValidation::Invalid(ReferralRejection::SelfReferral));
    }

    #[tokio::test]
    async fn converted_email_gets_already_referred() {
        let now = Timestamp::now();
        let (store, handler) = setup(now).await;
        let code = store
            .find_code(&CodeString::try_new("REF-AAAA1111").unwrap())
            .await
            .unwrap()
            .unwrap();
        let email = Email::try_new("friend@example.com").unwrap();
        store
            .insert_invitation(&ReferralInvitation::new(code.id, code.owner.clone(), email.clone(), now))
            .await
            .unwrap();
        store
            .convert_invitation(&ConversionRequest {
                email,
                invitee: UserId::new("friend").unwrap(),
                policy: RewardPolicy::new(RewardKind::Credit(Money::from_minor(1_000))).unwrap(),
                now,
            })
            .await
            .unwrap();

        let result = handler
            .handle(query("someone-else", Some("Friend@Example.com")))
            .await
            .unwrap();
        assert_eq!(result, ReferralCodeValidation::Invalid(ReferralRejection::AlreadyReferred));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (_, handler) = setup(Timestamp::now()).await;
        let mut q = query("friend", None);
        q.code = "REF-ZZZZ9999".to_string();
        let result = handler.handle(q).await.unwrap();
        assert_eq!(result, ReferralCodeValidation::Invalid(ReferralRejection::NotFound));
    }
}
