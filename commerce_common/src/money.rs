use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";
pub const DEFAULT_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------        Money        ---------------------------------------------------------
/// A monetary amount in minor units (cents).
///
/// All arithmetic on `Money` is exact integer arithmetic. Fractional values only exist at the
/// [`Decimal`] boundary, where they are rounded half-up to two decimal places.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<Decimal> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let cents = (value * Decimal::ONE_HUNDRED).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        cents.to_i64().map(Self).ok_or_else(|| MoneyConversionError(format!("{value} is out of range")))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let d = Decimal::from_str(s.trim().trim_start_matches('$'))
            .map_err(|e| MoneyConversionError(format!("{s} is not a valid amount: {e}")))?;
        Self::try_from(d)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-${}", Decimal::new(-self.0, 2))
        } else {
            write!(f, "${}", Decimal::new(self.0, 2))
        }
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units, e.g. `Money::from_whole(5)` is $5.00
    pub fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::Money;

    #[test]
    fn arithmetic_is_exact() {
        let a = Money::from_cents(10_050);
        let b = Money::from_cents(25);
        assert_eq!((a + b).value(), 10_075);
        assert_eq!((a - b).value(), 10_025);
        assert_eq!((b * 4).value(), 100);
        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.value(), 10_100);
    }

    #[test]
    fn decimal_conversion_rounds_half_up() {
        let d = Decimal::from_str("15.005").unwrap();
        let m = Money::try_from(d).unwrap();
        assert_eq!(m.value(), 1501);
        let d = Decimal::from_str("15.004").unwrap();
        assert_eq!(Money::try_from(d).unwrap().value(), 1500);
    }

    #[test]
    fn display_is_dollars_and_cents() {
        assert_eq!(Money::from_cents(123_456).to_string(), "$1234.56");
        assert_eq!(Money::from_whole(20).to_string(), "$20.00");
        assert_eq!(Money::from_cents(-150).to_string(), "-$1.50");
    }

    #[test]
    fn parses_amount_strings() {
        assert_eq!(Money::from_str("100.00").unwrap().value(), 10_000);
        assert_eq!(Money::from_str("$19.99").unwrap().value(), 1999);
        assert!(Money::from_str("a fiver").is_err());
    }
}
