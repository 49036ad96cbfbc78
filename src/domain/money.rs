use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A non-negative monetary value.
///
/// Wrapper around `rust_decimal::Decimal` so that financial arithmetic never
/// touches floats and negative amounts are rejected at construction. Bills
/// and payments only ever deal in non-negative figures; subtraction is
/// therefore checked rather than implemented as an operator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::validation("amount must not be negative"))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `None` when the result would be negative.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if self.0 >= rhs.0 {
            Some(Self(self.0 - rhs.0))
        } else {
            None
        }
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A currency code such as `USD`. Normalized to upper case; the engine does
/// not convert between currencies, it only tags amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(10.50)).is_ok());
        assert!(Amount::new(dec!(0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(-0.01)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_arithmetic() {
        let a = Amount::new(dec!(10.00)).unwrap();
        let b = Amount::new(dec!(2.50)).unwrap();
        assert_eq!(a + b, Amount::new(dec!(12.50)).unwrap());
        assert_eq!(a.checked_sub(b), Some(Amount::new(dec!(7.50)).unwrap()));
        assert_eq!(b.checked_sub(a), None);
    }

    #[test]
    fn test_amount_ordering() {
        let small = Amount::new(dec!(999.99)).unwrap();
        let limit = Amount::new(dec!(1000)).unwrap();
        assert!(small < limit);
        assert!(limit <= limit);
    }

    #[test]
    fn test_currency_normalization() {
        assert_eq!(Currency::new(" usd ").code(), "USD");
        assert_eq!(Currency::default().code(), "USD");
    }
}
