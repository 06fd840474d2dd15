//! PromoCode entity.
//!
//! A promo code grants a discount on course purchases. Its `current_uses`
//! counter only ever grows and never passes the usage cap; the counter is
//! written by the redemption path alone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{CodeString, DiscountTerms, PromoRejection};
use crate::domain::foundation::{CourseId, PromoCodeId, Timestamp, ValidationError};

/// How many times a code may be redeemed in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "max", rename_all = "snake_case")]
pub enum UsageLimit {
    /// No cap. Stored as a NULL `max_uses`.
    Unlimited,
    /// At most this many redemptions; always at least one.
    Capped(u32),
}

impl UsageLimit {
    /// Creates a capped limit, rejecting zero.
    pub fn capped(max: u32) -> Result<Self, ValidationError> {
        if max == 0 {
            return Err(ValidationError::out_of_range("max_uses", 1, i32::MAX as i64, 0));
        }
        Ok(UsageLimit::Capped(max))
    }

    /// Reads the nullable `max_uses` column.
    pub fn from_column(max_uses: Option<i32>) -> Result<Self, ValidationError> {
        match max_uses {
            None => Ok(UsageLimit::Unlimited),
            Some(n) if n >= 1 => Ok(UsageLimit::Capped(n as u32)),
            Some(n) => Err(ValidationError::out_of_range("max_uses", 1, i32::MAX as i64, n as i64)),
        }
    }

    /// Value for the nullable `max_uses` column.
    pub fn to_column(&self) -> Option<i32> {
        match self {
            UsageLimit::Unlimited => None,
            UsageLimit::Capped(max) => Some((*max).min(i32::MAX as u32) as i32),
        }
    }

    /// True if one more use fits under the limit.
    pub fn allows_another(&self, current_uses: u32) -> bool {
        match self {
            UsageLimit::Unlimited => true,
            UsageLimit::Capped(max) => current_uses < *max,
        }
    }

    /// Uses left, or `None` when unlimited.
    pub fn remaining(&self, current_uses: u32) -> Option<u32> {
        match self {
            UsageLimit::Unlimited => None,
            UsageLimit::Capped(max) => Some(max.saturating_sub(current_uses)),
        }
    }
}

/// The period during which a code may be redeemed, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_from: Timestamp,
    /// `None` means the code never expires.
    pub valid_to: Option<Timestamp>,
}

impl ValidityWindow {
    /// Creates a window, rejecting an end before the start.
    pub fn new(valid_from: Timestamp, valid_to: Option<Timestamp>) -> Result<Self, ValidationError> {
        if let Some(end) = valid_to {
            if end.is_before(&valid_from) {
                return Err(ValidationError::invalid_format(
                    "valid_to",
                    "must not be earlier than valid_from",
                ));
            }
        }
        Ok(Self { valid_from, valid_to })
    }

    /// A window that opens at `valid_from` and never closes.
    pub fn open_ended(valid_from: Timestamp) -> Self {
        Self {
            valid_from,
            valid_to: None,
        }
    }

    /// Checks `now` against both bounds.
    pub fn check(&self, now: Timestamp) -> Result<(), PromoRejection> {
        if let Some(end) = self.valid_to {
            if now.is_after(&end) {
                return Err(PromoRejection::Expired { expired_at: end });
            }
        }
        if now.is_before(&self.valid_from) {
            return Err(PromoRejection::NotYetValid {
                valid_from: self.valid_from,
            });
        }
        Ok(())
    }

    /// True when `now` lies inside the window.
    pub fn contains(&self, now: Timestamp) -> bool {
        self.check(now).is_ok()
    }
}

/// A promotional discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: CodeString,
    pub description: String,
    pub terms: DiscountTerms,
    pub is_active: bool,
    pub usage_limit: UsageLimit,
    pub current_uses: u32,
    pub window: ValidityWindow,
    /// Empty means the code applies to every course.
    pub applicable_course_ids: BTreeSet<CourseId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PromoCode {
    /// Creates a new, active, unused promo code.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: PromoCodeId,
        code: CodeString,
        description: impl Into<String>,
        terms: DiscountTerms,
        usage_limit: UsageLimit,
        window: ValidityWindow,
        applicable_course_ids: BTreeSet<CourseId>,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        terms.validate()?;
        if let UsageLimit::Capped(0) = usage_limit {
            return Err(ValidationError::out_of_range("max_uses", 1, i32::MAX as i64, 0));
        }
        let description = description.into();
        if description.len() > 500 {
            return Err(ValidationError::out_of_range(
                "description_length",
                0,
                500,
                description.len() as i64,
            ));
        }

        Ok(Self {
            id,
            code,
            description,
            terms,
            is_active: true,
            usage_limit,
            current_uses: 0,
            window,
            applicable_course_ids,
            created_at: now,
            updated_at: now,
        })
    }

    /// True if the code may be used for `course_id`.
    pub fn applies_to(&self, course_id: CourseId) -> bool {
        self.applicable_course_ids.is_empty() || self.applicable_course_ids.contains(&course_id)
    }

    /// True once the cap has been reached.
    pub fn is_exhausted(&self) -> bool {
        !self.usage_limit.allows_another(self.current_uses)
    }

    /// Runs every subject-independent redemption check in order:
    /// active, validity window, course applicability, remaining uses.
    pub fn check_redeemable(&self, course_id: CourseId, now: Timestamp) -> Result<(), PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::Inactive);
        }
        self.window.check(now)?;
        if !self.applies_to(course_id) {
            return Err(PromoRejection::NotApplicable { course_id });
        }
        if self.is_exhausted() {
            return Err(self.exhausted_rejection());
        }
        Ok(())
    }

    /// Consumes one use if the cap allows it.
    ///
    /// Only the redemption path may call this, inside its atomic unit.
    pub fn consume_use(&mut self, now: Timestamp) -> Result<(), PromoRejection> {
        if self.is_exhausted() {
            return Err(self.exhausted_rejection());
        }
        self.current_uses += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Stops further redemptions. Counters are left untouched.
    pub fn deactivate(&mut self, now: Timestamp) {
        if self.is_active {
            self.is_active = false;
            self.updated_at = now;
        }
    }

    fn exhausted_rejection(&self) -> PromoRejection {
        PromoRejection::Exhausted {
            used: self.current_uses,
            max: self.usage_limit.to_column().map(|m| m as u32),
        }
    }
}
