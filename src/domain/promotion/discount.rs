//! Discount terms and the discount calculator.
//!
//! A promo code carries exactly one discount mode, modelled as a tagged
//! union. `compute_discount` is pure and deterministic: all arithmetic is
//! fixed-point decimal, rounded half away from zero to the cent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Money, Percentage, ValidationError};

/// The discount a promo code grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum DiscountTerms {
    /// A share of the item price.
    Percent(Percentage),
    /// An absolute amount off the item price.
    FixedAmount(Money),
}

impl DiscountTerms {
    /// Builds terms from the two nullable storage columns.
    ///
    /// When both columns are populated the percentage wins. A row with
    /// neither column set carries no discount and is rejected.
    pub fn from_columns(
        percent: Option<Decimal>,
        amount: Option<Decimal>,
    ) -> Result<Self, ValidationError> {
        match (percent, amount) {
            (Some(p), _) => Ok(DiscountTerms::Percent(Percentage::try_new(p)?)),
            (None, Some(a)) => Ok(DiscountTerms::FixedAmount(Money::try_new(a)?)),
            (None, None) => Err(ValidationError::empty_field("discount")),
        }
    }

    /// Splits terms into `(discount_percent, discount_amount)` columns.
    pub fn to_columns(&self) -> (Option<Decimal>, Option<Decimal>) {
        match self {
            DiscountTerms::Percent(p) => (Some(p.value()), None),
            DiscountTerms::FixedAmount(m) => (None, Some(m.amount())),
        }
    }

    /// Rejects terms that can never discount anything.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DiscountTerms::Percent(p) if p.value().is_zero() => Err(
                ValidationError::invalid_format("discount_percent", "must be greater than zero"),
            ),
            DiscountTerms::FixedAmount(m) if m.is_zero() => Err(
                ValidationError::invalid_format("discount_amount", "must be greater than zero"),
            ),
            _ => Ok(()),
        }
    }
}

/// Computes the discount for an item price.
///
/// Percent: `round(price * percent / 100)`, clamped to `[0, price]`.
/// Fixed: `min(amount, price)`. The final price is never negative.
pub fn compute_discount(terms: &DiscountTerms, price: Money) -> Money {
    let discount = match terms {
        DiscountTerms::Percent(percent) => {
            // rate <= 1, so the product is bounded by the price.
            let rate = percent.value() / Decimal::ONE_HUNDRED;
            match price.amount().checked_mul(rate) {
                Some(raw) => Money::from_rounded(raw),
                None => price,
            }
        }
        DiscountTerms::FixedAmount(amount) => *amount,
    };
    discount.min(price)
}
