//! Money value object backed by a fixed-point decimal.
//!
//! Amounts are non-negative and carry exactly two fractional digits, so
//! arithmetic on prices and discounts is deterministic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Number of fractional digits carried by every amount.
pub const MONEY_SCALE: u32 = 2;

/// A non-negative currency amount with two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates an amount, rejecting negatives and sub-cent precision.
    pub fn try_new(value: Decimal) -> Result<Self, ValidationError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("must not be negative, got {}", value),
            ));
        }
        let normalized = value.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("at most {} fractional digits, got {}", MONEY_SCALE, value),
            ));
        }
        let mut scaled = normalized;
        scaled.rescale(MONEY_SCALE);
        Ok(Self(scaled))
    }

    /// Creates an amount from minor units (cents).
    pub fn from_minor(minor: u64) -> Self {
        let mut value = Decimal::from(minor);
        value.set_scale(MONEY_SCALE).ok();
        Self(value)
    }

    /// Rounds an arbitrary decimal half away from zero to two places,
    /// clamping negatives to zero.
    pub fn from_rounded(value: Decimal) -> Self {
        if value.is_sign_negative() {
            return Self::ZERO;
        }
        let mut rounded = value.round_dp_with_strategy(
            MONEY_SCALE,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        );
        rounded.rescale(MONEY_SCALE);
        Self(rounded)
    }

    /// Returns the decimal value.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true for a zero amount.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtracts, saturating at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        if other.0 >= self.0 {
            Money::ZERO
        } else {
            Money(self.0 - other.0)
        }
    }

    /// Adds two amounts.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_fractional_digits() {
        let m = Money::try_new(Decimal::new(19999, 2)).unwrap();
        assert_eq!(m.to_string(), "199.99");
    }

    #[test]
    fn whole_numbers_display_with_cents() {
        let m = Money::try_new(Decimal::from(200)).unwrap();
        assert_eq!(m.to_string(), "200.00");
    }

    #[test]
    fn trailing_zeros_beyond_scale_are_accepted() {
        let m = Money::try_new(Decimal::new(100000, 4)).unwrap();
        assert_eq!(m, Money::from_minor(1000));
    }

    #[test]
    fn rejects_sub_cent_precision() {
        assert!(Money::try_new(Decimal::new(1001, 3)).is_err());
    }

    #[test]
    fn rejects_negative_amounts() {
        assert!(Money::try_new(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn from_rounded_uses_half_away_from_zero() {
        assert_eq!(Money::from_rounded(Decimal::new(12345, 3)), Money::from_minor(1235));
        assert_eq!(Money::from_rounded(Decimal::new(12344, 3)), Money::from_minor(1234));
        assert_eq!(Money::from_rounded(Decimal::new(-5, 0)), Money::ZERO);
    }

    #[test]
    fn saturating_sub_never_goes_negative() {
        let a = Money::from_minor(500);
        let b = Money::from_minor(900);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::from_minor(400));
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Money>("\"12.50\"").is_ok());
        assert!(serde_json::from_str::<Money>("\"-1.00\"").is_err());
    }
}
