//! Monetary amounts.
//!
//! Never use floating-point for money calculations. Amounts wrap
//! `rust_decimal::Decimal` and carry at most two fractional digits, matching
//! the `NUMERIC(14,2)` storage columns.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits stored for money.
pub const MONEY_SCALE: u32 = 2;

/// Errors raised while validating an amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Zero or negative value.
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),

    /// More than two fractional digits.
    #[error("amount {0} has more than 2 fractional digits")]
    TooPrecise(Decimal),
}

/// A strictly positive amount with at most two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Validates and wraps a decimal value.
    ///
    /// # Errors
    ///
    /// Returns `AmountError` for non-positive values or values with more than
    /// two fractional digits.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }
        let normalized = value.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(AmountError::TooPrecise(value));
        }
        let mut scaled = normalized;
        scaled.rescale(MONEY_SCALE);
        Ok(Self(scaled))
    }

    /// Returns the wrapped decimal.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Multiplies the amount by a count, e.g. price times paid children.
    #[must_use]
    pub fn times(self, count: u64) -> Decimal {
        self.0 * Decimal::from(count)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(100), "100.00")]
    #[case(dec!(0.01), "0.01")]
    #[case(dec!(12.50), "12.50")]
    #[case(dec!(7.100), "7.10")]
    fn test_amount_accepts_and_normalizes(#[case] input: Decimal, #[case] expected: &str) {
        assert_eq!(Amount::new(input).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5))]
    fn test_amount_rejects_non_positive(#[case] input: Decimal) {
        assert_eq!(Amount::new(input), Err(AmountError::NotPositive(input)));
    }

    #[test]
    fn test_amount_rejects_sub_cent() {
        assert_eq!(
            Amount::new(dec!(1.005)),
            Err(AmountError::TooPrecise(dec!(1.005)))
        );
    }

    #[test]
    fn test_amount_times() {
        let price = Amount::new(dec!(25.50)).unwrap();
        assert_eq!(price.times(3), dec!(76.50));
        assert_eq!(price.times(0), Decimal::ZERO);
    }

    #[test]
    fn test_amount_deserializes_from_string() {
        let amount: Amount = serde_json::from_str("\"10.5\"").unwrap();
        assert_eq!(amount.value(), dec!(10.50));
        assert!(serde_json::from_str::<Amount>("\"-1\"").is_err());
    }
}
