use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed-point monetary amount in millionths of the reporting currency.
///
/// Integer arithmetic keeps budget comparisons exact: a cap of three calls' cost admits
/// exactly three calls regardless of summation order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cost(u64);

impl Cost {
    pub const ZERO: Cost = Cost(0);
    pub const MICROS_PER_UNIT: u64 = 1_000_000;

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[inline]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Converts a decimal amount, rounding to the nearest micro. Negative or
    /// non-finite amounts clamp to zero.
    pub fn from_amount(amount: f64) -> Self {
        if !amount.is_finite() || amount <= 0.0 {
            return Self::ZERO;
        }
        Self((amount * Self::MICROS_PER_UNIT as f64).round() as u64)
    }

    #[inline]
    pub fn as_amount(self) -> f64 {
        self.0 as f64 / Self::MICROS_PER_UNIT as f64
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn saturating_mul(self, n: u64) -> Self {
        Self(self.0.saturating_mul(n))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Cost) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, |acc, c| acc + c)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.0 / Self::MICROS_PER_UNIT,
            self.0 % Self::MICROS_PER_UNIT
        )
    }
}

impl FromStr for Cost {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount: f64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid amount '{}': {}", s, e))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("amount must be a non-negative number, got '{}'", s));
        }
        Ok(Self::from_amount(amount))
    }
}
