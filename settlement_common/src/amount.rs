use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The settlement currency used when none is configured.
pub const DEFAULT_CURRENCY_CODE: &str = "IDR";

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount in integer minor units of the (single) settlement currency.
///
/// Order totals, adjustments and redemption costs all share this unit. Negative values are legal and are used for
/// deductions.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Amount(i64);

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

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Sums saturate at the bounds of `i64`. Use [`Amount::checked_sum`] where an overflow must be reported.
impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Amount::saturating_add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Amount {
    type Error = AmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| AmountConversionError(format!("Value {value} is too large to convert to an Amount")))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.saturating_abs())
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// The sum of the amounts, or `None` if it does not fit in an `i64`.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts.into_iter().try_fold(Self::ZERO, Amount::checked_add)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the amount as a deduction, i.e. `-|self|`. Idempotent.
    pub fn as_deduction(&self) -> Self {
        if self.0 < 0 {
            *self
        } else {
            Self(-self.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deductions_are_always_negative() {
        assert_eq!(Amount::from(120).as_deduction(), Amount::from(-120));
        assert_eq!(Amount::from(-120).as_deduction(), Amount::from(-120));
        assert_eq!(Amount::from(-120).as_deduction().as_deduction(), Amount::from(-120));
    }

    #[test]
    fn arithmetic() {
        let total: Amount = [500, 1000].into_iter().map(Amount::from).sum();
        assert_eq!(total, Amount::from(1500));
        let mut a = total;
        a -= Amount::from(120);
        assert_eq!(a.value(), 1380);
        a += Amount::from(20);
        assert_eq!(a, Amount::from(1400));
        assert_eq!(-a, Amount::from(-1400));
        assert_eq!(Amount::from(3) * 4, Amount::from(12));
        assert!(Amount::try_from(u64::MAX).is_err());
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        let min = Amount::from(i64::MIN);
        let max = Amount::from(i64::MAX);
        assert_eq!(min.as_deduction(), min);
        assert_eq!(max.as_deduction(), Amount::from(-i64::MAX));
        assert_eq!(min.abs(), max);
        assert_eq!(max.checked_add(Amount::from(1)), None);
        assert_eq!(Amount::checked_sum([max, Amount::from(1)]), None);
        assert_eq!(Amount::checked_sum([max, Amount::from(-1)]), Some(Amount::from(i64::MAX - 1)));
        assert_eq!(Amount::checked_sum([]), Some(Amount::ZERO));
        assert_eq!([max, max].into_iter().sum::<Amount>(), max);
        assert_eq!([min, min].into_iter().sum::<Amount>(), min);
    }

    #[test]
    fn serializes_as_a_bare_integer() {
        let json = serde_json::to_string(&Amount::from(-120)).unwrap();
        assert_eq!(json, "-120");
        let back: Amount = serde_json::from_str("1500").unwrap();
        assert_eq!(back, Amount::from(1500));
    }
}
