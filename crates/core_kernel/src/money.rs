//! Money type with exact fixed-point arithmetic
//!
//! Amounts are stored as a signed count of ten-thousandths of the currency
//! unit. Every sum, difference and comparison is integer arithmetic, so
//! totalling hundreds of payments never drifts the way binary floating point
//! does. Conversion to and from `f64` or `Decimal` happens only at the edges.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of internal units per whole currency unit (4 decimal places)
const UNITS_PER_MAJOR: i64 = 10_000;

/// Internal units per cent
const UNITS_PER_CENT: i64 = 100;

/// Threshold below which a remainder or balance counts as settled (0.01)
pub const SETTLEMENT_EPSILON: Money = Money(UNITS_PER_CENT);

/// Errors that can occur during money operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A signed monetary amount
///
/// The derived `Ord`/`Eq` are exact. Use [`Money::compare`],
/// [`Money::approx_eq`] and [`Money::is_zero`] wherever "fully paid" or
/// "balance is zero" is decided, since those apply [`SETTLEMENT_EPSILON`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Money(i64);

impl Money {
    /// Zero amount
    pub const ZERO: Money = Money(0);

    /// Decimal places kept internally
    pub const SCALE: u32 = 4;

    /// Creates money from raw internal units (ten-thousandths)
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Creates money from cents, e.g. `from_cents(10050)` is 100.50
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents * UNITS_PER_CENT)
    }

    /// Creates money from a whole number of currency units
    pub const fn from_major(major: i64) -> Self {
        Self(major * UNITS_PER_MAJOR)
    }

    /// Creates money from a decimal, rounding half away from zero to 4 places
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let scaled = amount
            .round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::from(UNITS_PER_MAJOR))
            .ok_or(MoneyError::Overflow)?;

        scaled.to_i64().map(Self).ok_or(MoneyError::Overflow)
    }

    /// Creates money from a floating point value received at the boundary
    pub fn from_f64(amount: f64) -> Result<Self, MoneyError> {
        if !amount.is_finite() {
            return Err(MoneyError::InvalidAmount(format!("{amount} is not a finite number")));
        }
        let decimal = Decimal::from_f64(amount).ok_or(MoneyError::Overflow)?;
        Self::from_decimal(decimal)
    }

    /// Returns the raw internal units
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns the amount as an exact decimal
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }

    /// Returns the amount as a float for display-oriented collaborators
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / UNITS_PER_MAJOR as f64
    }

    /// Returns true if the amount is within [`SETTLEMENT_EPSILON`] of zero
    pub fn is_zero(&self) -> bool {
        self.0.unsigned_abs() < SETTLEMENT_EPSILON.0.unsigned_abs()
    }

    /// Returns true only for an amount of exactly zero
    pub const fn is_exactly_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is strictly negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Compares two amounts, treating differences below the epsilon as equal
    pub fn compare(&self, other: &Money) -> Ordering {
        let diff = self.0 as i128 - other.0 as i128;
        if diff.abs() < SETTLEMENT_EPSILON.0 as i128 {
            Ordering::Equal
        } else {
            diff.cmp(&0)
        }
    }

    /// Returns true if the amounts differ by less than the epsilon
    pub fn approx_eq(&self, other: &Money) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Snaps the amount to zero when its magnitude is below `epsilon`
    pub fn clamp_to_zero_if_negligible(&self, epsilon: Money) -> Money {
        if self.0.unsigned_abs() < epsilon.0.unsigned_abs() {
            Money::ZERO
        } else {
            *self
        }
    }

    /// Checked addition
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(other.0).map(Self).ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_sub(other.0).map(Self).ok_or(MoneyError::Overflow)
    }

    /// Addition clamped to the representable range
    pub fn saturating_add(&self, other: Money) -> Money {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtraction clamped to the representable range
    pub fn saturating_sub(&self, other: Money) -> Money {
        Self(self.0.saturating_sub(other.0))
    }

    /// Sums amounts, failing on overflow instead of clamping
    pub fn checked_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .to_decimal()
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{:.2}", rounded)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| MoneyError::InvalidAmount(format!("{s:?}: {e}")))?;
        Self::from_decimal(decimal)
    }
}

impl TryFrom<f64> for Money {
    type Error = MoneyError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_f64(value)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> f64 {
        money.to_f64()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Saturates at the bounds; use [`Money::checked_sum`] where overflow must
/// be reported
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |total, amount| total.saturating_add(amount))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
