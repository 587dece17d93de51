//! Transfer amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A strictly positive, exact decimal amount of money.
///
/// Balances themselves are plain `Decimal`s (zero is a valid balance); only
/// the quantity being moved must be positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be positive"));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl ValueObject for Amount {}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert_eq!(
            Amount::new(Decimal::ZERO),
            Err(DomainError::validation("amount must be positive"))
        );
        assert!(Amount::new(dec!(-5)).is_err());
    }

    #[test]
    fn fractional_amounts_are_kept_exactly() {
        let amount = Amount::new(dec!(0.1)).unwrap();
        assert_eq!(amount.value() + dec!(0.2), dec!(0.3));
    }

    #[test]
    fn display_drops_trailing_zeros() {
        let amount = Amount::new(dec!(200.00)).unwrap();
        assert_eq!(amount.to_string(), "200");
    }
}
