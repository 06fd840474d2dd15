//! Per-referrer statistics, derived from invitation and reward rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Money;

/// Aggregate referral figures for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStatistics {
    pub total_invitations: u64,
    pub successful_referrals: u64,
    pub total_credit_earned: Money,
    /// `successful_referrals / total_invitations`; zero when nothing was sent.
    pub conversion_rate: Decimal,
}

impl ReferralStatistics {
    pub fn from_counts(total_invitations: u64, successful_referrals: u64, total_credit_earned: Money) -> Self {
        Self {
            total_invitations,
            successful_referrals,
            total_credit_earned,
            conversion_rate: conversion_rate(successful_referrals, total_invitations),
        }
    }
}

fn conversion_rate(successful: u64, total: u64) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(successful)
        .checked_div(Decimal::from(total))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_invitations_gives_zero_rate() {
        let stats = ReferralStatistics::from_counts(0, 0, Money::ZERO);
        assert_eq!(stats.conversion_rate, Decimal::ZERO);
    }

    #[test]
    fn rate_is_exact_ratio() {
        let stats = ReferralStatistics::from_counts(4, 1, Money::from_minor(1_000));
        assert_eq!(stats.conversion_rate, Decimal::new(25, 2));
        assert_eq!(stats.total_credit_earned, Money::from_minor(1_000));
    }

    #[test]
    fn full_conversion_is_one() {
        let stats = ReferralStatistics::from_counts(3, 3, Money::ZERO);
        assert_eq!(stats.conversion_rate, Decimal::ONE);
    }

    #[test]
    fn thirds_match_decimal_division() {
        let stats = ReferralStatistics::from_counts(3, 1, Money::ZERO);
        assert_eq!(stats.conversion_rate, Decimal::ONE / Decimal::from(3));
    }
}
