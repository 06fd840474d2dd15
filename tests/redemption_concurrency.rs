//! Integration tests for promo code redemption under concurrent load.
//!
//! Every attempt goes through the same handler the request layer would use,
//! backed by the in-memory store.

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;

use redemption_engine::adapters::{FixedClock, InMemoryPromoCodeStore};
use redemption_engine::application::handlers::{
    CreatePromoCodeCommand, CreatePromoCodeHandler, DiscountInput, ListPromoCodeUsagesHandler,
    ListPromoCodeUsagesQuery, ListValidPromoCodesHandler, ListValidPromoCodesQuery,
    RedeemPromoCodeCommand, RedeemPromoCodeHandler, ValidatePromoCodeHandler,
    ValidatePromoCodeQuery,
};
use redemption_engine::application::StorePolicy;
use redemption_engine::domain::foundation::{CourseId, Money, Timestamp, UserId};
use redemption_engine::domain::promotion::{CodeString, PromoRejection, PromoValidation};
use redemption_engine::domain::redemption::RedemptionError;
use redemption_engine::ports::PromoCodeStore;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Engine {
    store: Arc<InMemoryPromoCodeStore>,
    clock: Arc<FixedClock>,
    redeem: Arc<RedeemPromoCodeHandler>,
}

impl Engine {
    fn new() -> Self {
        let store = Arc::new(InMemoryPromoCodeStore::new());
        let clock = Arc::new(FixedClock::new(Timestamp::now()));
        let redeem = Arc::new(RedeemPromoCodeHandler::new(
            store.clone(),
            clock.clone(),
            StorePolicy::default(),
        ));
        Self {
            store,
            clock,
            redeem,
        }
    }

    async fn create(&self, code: &str, percent: i64, max_uses: Option<u32>, courses: Vec<i64>) {
        let now = Timestamp::now();
        CreatePromoCodeHandler::new(self.store.clone(), self.clock.clone())
            .handle(CreatePromoCodeCommand {
                code: code.to_string(),
                description: format!("{} percent off", percent),
                discount: DiscountInput::Percent(Decimal::new(percent, 0)),
                max_uses,
                valid_from: Some(now.minus_days(1)),
                valid_to: Some(now.add_days(30)),
                applicable_course_ids: courses.into_iter().map(|c| CourseId::new(c).unwrap()).collect(),
            })
            .await
            .unwrap();
    }

    async fn current_uses(&self, code: &str) -> u32 {
        self.store
            .find_by_code(&CodeString::try_new(code).unwrap())
            .await
            .unwrap()
            .unwrap()
            .current_uses
    }
}

fn redeem_command(code: &str, user: &str, course: i64, price_minor: u64) -> RedeemPromoCodeCommand {
    RedeemPromoCodeCommand {
        code: code.to_string(),
        user_id: UserId::new(user).unwrap(),
        course_id: CourseId::new(course).unwrap(),
        price: Money::from_minor(price_minor),
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_for_limited_uses_admits_exactly_the_cap() {
    let engine = Engine::new();
    engine.create("FLASH5", 50, Some(5), vec![]).await;

    let attempts = (0..40).map(|i| {
        let handler = engine.redeem.clone();
        tokio::spawn(async move {
            handler
                .handle(redeem_command("FLASH5", &format!("user-{}", i), 1, 10_000))
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 5);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(RedemptionError::Promo(PromoRejection::Exhausted { .. }))
        ));
    }
    assert_eq!(engine.current_uses("FLASH5").await, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn same_subject_racing_redeems_once() {
    let engine = Engine::new();
    engine.create("TWICE", 10, None, vec![]).await;

    let attempts = (0..10).map(|_| {
        let handler = engine.redeem.clone();
        tokio::spawn(async move { handler.handle(redeem_command("TWICE", "user-a", 3, 5_000)).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == RedemptionError::Promo(PromoRejection::AlreadyUsed)));
    assert_eq!(engine.current_uses("TWICE").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_codes_do_not_interfere() {
    let engine = Engine::new();
    engine.create("ALPHA", 10, Some(3), vec![]).await;
    engine.create("BRAVO", 10, Some(3), vec![]).await;

    let attempts = (0..12).map(|i| {
        let handler = engine.redeem.clone();
        let code = if i % 2 == 0 { "ALPHA" } else { "BRAVO" };
        tokio::spawn(async move {
            handler
                .handle(redeem_command(code, &format!("user-{}", i), 1, 1_000))
                .await
        })
    });
    join_all(attempts).await;

    assert_eq!(engine.current_uses("ALPHA").await, 3);
    assert_eq!(engine.current_uses("BRAVO").await, 3);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn save10_scenario() {
    let engine = Engine::new();
    engine.create("SAVE10", 10, Some(1), vec![5]).await;

    let result = engine
        .redeem
        .handle(redeem_command("SAVE10", "user-a", 5, 20_000))
        .await
        .unwrap();
    assert_eq!(result.usage.discount_amount, Money::from_minor(2_000));
    assert_eq!(result.final_price, Money::from_minor(18_000));
    assert_eq!(engine.current_uses("SAVE10").await, 1);

    let err = engine
        .redeem
        .handle(redeem_command("SAVE10", "user-b", 5, 20_000))
        .await
        .unwrap_err();
    assert!(matches!(err, RedemptionError::Promo(PromoRejection::Exhausted { .. })));

    let usages = ListPromoCodeUsagesHandler::new(engine.store.clone())
        .handle(ListPromoCodeUsagesQuery {
            code: "SAVE10".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].user_id.as_str(), "user-a");
}

#[tokio::test]
async fn validation_never_consumes_uses() {
    let engine = Engine::new();
    engine.create("LOOK", 15, Some(1), vec![]).await;
    let validate = ValidatePromoCodeHandler::new(engine.store.clone(), engine.clock.clone());

    for _ in 0..5 {
        let validation = validate
            .handle(ValidatePromoCodeQuery {
                code: "LOOK".to_string(),
                user_id: UserId::new("user-a").unwrap(),
                course_id: CourseId::new(1).unwrap(),
            })
            .await
            .unwrap();
        assert!(validation.is_valid());
    }
    assert_eq!(engine.current_uses("LOOK").await, 0);
}

#[tokio::test]
async fn expired_code_is_rejected_with_uses_left() {
    let engine = Engine::new();
    engine.create("SUMMER", 20, Some(100), vec![]).await;
    engine.clock.advance_days(31);

    let err = engine
        .redeem
        .handle(redeem_command("SUMMER", "user-a", 1, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, RedemptionError::Promo(PromoRejection::Expired { .. })));

    let validation = ValidatePromoCodeHandler::new(engine.store.clone(), engine.clock.clone())
        .handle(ValidatePromoCodeQuery {
            code: "SUMMER".to_string(),
            user_id: UserId::new("user-a").unwrap(),
            course_id: CourseId::new(1).unwrap(),
        })
        .await
        .unwrap();
    assert!(matches!(
        validation,
        PromoValidation::Invalid(PromoRejection::Expired { .. })
    ));
}

#[tokio::test]
async fn listing_hides_exhausted_codes() {
    let engine = Engine::new();
    engine.create("ONCE", 10, Some(1), vec![]).await;
    engine.create("OFTEN", 10, None, vec![]).await;
    engine
        .redeem
        .handle(redeem_command("ONCE", "user-a", 2, 1_000))
        .await
        .unwrap();

    let codes = ListValidPromoCodesHandler::new(engine.store.clone(), engine.clock.clone())
        .handle(ListValidPromoCodesQuery {
            course_id: Some(CourseId::new(2).unwrap()),
        })
        .await
        .unwrap();
    let names: Vec<_> = codes.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(names, vec!["OFTEN"]);
}
