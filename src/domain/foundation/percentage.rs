//! Percentage value object (0-100 scale).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A decimal value between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    /// Zero percent.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// One hundred percent.
    pub const HUNDRED: Self = Self(Decimal::ONE_HUNDRED);

    /// Creates a Percentage, returning error if out of range.
    pub fn try_new(value: Decimal) -> Result<Self, ValidationError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(ValidationError::out_of_range(
                "discount_percent",
                0,
                100,
                value.trunc().to_i64().unwrap_or(i64::MAX),
            ));
        }
        Ok(Self(value.normalize()))
    }

    /// Creates a Percentage from a whole number.
    pub fn whole(value: u8) -> Result<Self, ValidationError> {
        Self::try_new(Decimal::from(value))
    }

    /// Returns the value on the 0-100 scale.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
