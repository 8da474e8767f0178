use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("invalid monetary amount '{0}'")]
    Parse(String),
    #[error("amount {0} does not fit into minor units")]
    Overflow(String),
}

/// Normalize a monetary value to 2 decimal places, rounding half away from zero.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    let shifted = value * BigDecimal::from(100);
    let half = BigDecimal::new(5.into(), 1);
    let adjusted = if shifted < BigDecimal::zero() {
        shifted - half
    } else {
        shifted + half
    };
    // with_scale truncates toward zero, which after the half adjustment is half-up.
    let (cents, _) = adjusted.with_scale(0).into_bigint_and_exponent();
    BigDecimal::new(cents, 2)
}

/// Amount of money in the store currency, always held at scale 2.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(from = "BigDecimal", into = "BigDecimal")]
#[sqlx(transparent)]
pub struct Money(BigDecimal);

impl Money {
    pub fn new(raw: BigDecimal) -> Self {
        Self(normalize_scale(&raw))
    }

    pub fn zero() -> Self {
        Self::from_cents(0)
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(BigDecimal::new(cents.into(), 2))
    }

    /// Minor-unit (cent) representation used by payment providers.
    pub fn as_cents(&self) -> Result<i64, MoneyError> {
        (&self.0 * BigDecimal::from(100))
            .with_scale(0)
            .to_i64()
            .ok_or_else(|| MoneyError::Overflow(self.0.to_string()))
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > BigDecimal::zero()
    }

    /// Line amount for `quantity` units at this unit price.
    pub fn times(&self, quantity: i32) -> Money {
        Money::new(&self.0 * BigDecimal::from(quantity))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<BigDecimal> for Money {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}

impl From<Money> for BigDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s.trim())
            .map(Money::new)
            .map_err(|_| MoneyError::Parse(s.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Money> for Money {
    type Output = Money;

    fn add(self, rhs: &'a Money) -> Money {
        Money::new(self.0 + &rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, item| acc + item)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, item| acc + item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bd(raw: &str) -> BigDecimal {
        BigDecimal::from_str(raw).unwrap()
    }

    #[test]
    fn normalize_rounds_half_up() {
        assert_eq!(normalize_scale(&bd("12.3456")).to_string(), "12.35");
        assert_eq!(normalize_scale(&bd("12.344")).to_string(), "12.34");
        assert_eq!(normalize_scale(&bd("0.005")).to_string(), "0.01");
        assert_eq!(normalize_scale(&bd("-0.005")).to_string(), "-0.01");
        assert_eq!(normalize_scale(&bd("7")).to_string(), "7.00");
    }

    #[test]
    fn cents_round_trip() {
        let m = Money::from_cents(1999);
        assert_eq!(m.to_string(), "19.99");
        assert_eq!(m.as_cents().unwrap(), 1999);
    }

    #[test]
    fn times_and_sum() {
        let price: Money = "4.25".parse().unwrap();
        let lines = [price.times(3), Money::from_cents(50)];
        let total: Money = lines.iter().sum();
        assert_eq!(total, Money::from_cents(1325));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!("abc".parse::<Money>(), Err(MoneyError::Parse(_))));
    }

    #[test]
    fn positive_check() {
        assert!(Money::from_cents(1).is_positive());
        assert!(!Money::zero().is_positive());
        assert!(!Money::from_cents(-5).is_positive());
    }
}
