use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// currency minor-unit precision
pub const MONEY_DP: u32 = 2;

/// round half-up to minor units
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Money held at currency minor-unit precision (2 places).
///
/// Every constructor and operator re-rounds half-up, so a value produced by one
/// pricing stage is already rounded when it feeds the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(round_money(d))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str_exact(s)?))
    }

    /// create from integer amount (dollars, euros, etc)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor amount (cents)
    pub fn from_minor(amount: i64) -> Self {
        Money(Decimal::new(amount, MONEY_DP))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// strictly below zero; `-0.00` is not negative
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// apply a rate (0.10 = 10%)
    pub fn apply_rate(&self, rate: Rate) -> Self {
        Money::from_decimal(self.0 * rate.as_decimal())
    }

    /// calculate percentage (e.g., 80 for 80% of the amount)
    pub fn percentage(&self, percent: Decimal) -> Self {
        Money::from_decimal(self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// subtraction floored at zero
    pub fn saturating_sub(self, other: Money) -> Money {
        (self - other).max(Money::ZERO)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money::from_decimal(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money::from_decimal(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        *self = *self - other;
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money::from_decimal(self.0 * other)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// rate type for fees, taxes and refund shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from decimal (e.g., 0.08 for 8%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 8 for 8%)
    pub fn from_percentage(p: Decimal) -> Self {
        Rate(p / Decimal::ONE_HUNDRED)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        (self.0 * Decimal::ONE_HUNDRED).normalize()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_half_up() {
        assert_eq!(Money::from_decimal(dec!(10.555)).as_decimal(), dec!(10.56));
        assert_eq!(Money::from_decimal(dec!(10.545)).as_decimal(), dec!(10.55));
        assert_eq!(Money::from_decimal(dec!(0.005)).as_decimal(), dec!(0.01));
        assert_eq!(Money::from_decimal(dec!(1.234)).as_decimal(), dec!(1.23));
    }

    #[test]
    fn test_money_display_has_two_places() {
        assert_eq!(Money::from_major(12).to_string(), "12.00");
        assert_eq!(Money::from_minor(1056).to_string(), "10.56");
    }

    #[test]
    fn test_rate_application() {
        let fee = Rate::from_percentage(dec!(10));
        assert_eq!(Money::from_major(120).apply_rate(fee), Money::from_major(12));

        let tax = Rate::from_percentage(dec!(8));
        assert_eq!(Money::from_major(132).apply_rate(tax), Money::from_minor(1056));
        assert_eq!(tax.to_string(), "8%");
    }

    #[test]
    fn test_saturating_sub_and_sum() {
        let total: Money = [Money::from_major(100), Money::from_major(150)].into_iter().sum();
        assert_eq!(total, Money::from_major(250));
        assert_eq!(Money::from_major(5).saturating_sub(Money::from_major(9)), Money::ZERO);
    }

    #[test]
    fn test_deserialized_money_is_rounded() {
        let money: Money = serde_json::from_str("\"1.005\"").unwrap();
        assert_eq!(money.as_decimal(), dec!(1.01));
        assert_eq!(money.to_string(), "1.01");

        let json = serde_json::to_string(&Money::from_minor(1056)).unwrap();
        assert_eq!(json, "\"10.56\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_minor(1056));
    }
}
