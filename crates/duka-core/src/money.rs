//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (2 decimal places)                   │
//! │    "1250.50" is stored as 125050                                        │
//! │    Every rounding step is explicit and HALF-UP                          │
//! │                                                                         │
//! │  Where rounding happens:                                                │
//! │    • parsing "12.345" from a caller    → 12.35                          │
//! │    • splitting a refund across items   → last item takes the remainder  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::money::Money;
//!
//! let price = Money::from_cents(1099);          // 10.99
//! let line = price.multiply_quantity(3);         // 32.97
//! let parsed = Money::parse("12.345").unwrap();  // 12.35 (half-up)
//! assert_eq!(line.cents(), 3297);
//! assert_eq!(parsed.cents(), 1235);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (two decimal places).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values represent refund reversals in the
///   payment ledger
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **i128 intermediates**: multiplication and allocation never overflow
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Batch.selling_price ──┐                                                │
/// │  Batch.wholesale_price ┴─► resolve_price ─► unit_price × qty            │
/// │                                                  │                      │
/// │                                                  ▼                      │
/// │               Sale.total ─ discount ─► Sale.final ◄── Payment ledger    │
/// │                                                  │                      │
/// │                                                  ▼                      │
/// │                                         Refund.amount                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole major units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Parses a decimal string, rounding half-up to two decimal places.
    ///
    /// Accepts an optional leading sign, digits and at most one `.`.
    /// Extra fractional digits beyond the second are rounded, never truncated.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// assert_eq!(Money::parse("10").unwrap().cents(), 1000);
    /// assert_eq!(Money::parse("10.5").unwrap().cents(), 1050);
    /// assert_eq!(Money::parse("0.005").unwrap().cents(), 1);
    /// assert_eq!(Money::parse("0.004").unwrap().cents(), 0);
    /// assert!(Money::parse("ten").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let s = input.trim();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            Some(_) => (false, s),
            None => return Err(invalid("must not be empty")),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("must contain digits"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("must be a decimal number"));
        }

        let whole: i128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("is too large"))?
        };

        let mut frac_digits = frac.bytes().map(|b| (b - b'0') as i128);
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().map(|d| d >= 5).unwrap_or(false);

        let mut cents = whole * 100 + tenths * 10 + hundredths;
        if round_up {
            cents += 1;
        }
        if negative {
            cents = -cents;
        }

        i64::try_from(cents)
            .map(Money)
            .map_err(|_| invalid("is too large"))
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Subtracts, flooring the result at zero.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let total = Money::from_cents(1000);
    /// assert_eq!(total.saturating_sub_floor(Money::from_cents(1500)), Money::zero());
    /// ```
    #[inline]
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use duka_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// [`Money::multiply_quantity`] that returns `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Splits `self` across `weights` proportionally.
    ///
    /// Every share except the last is rounded half-up; the last share takes
    /// whatever is left so the shares always sum to exactly `self`.
    ///
    /// ## User Workflow
    /// ```text
    /// Whole-sale refund of 100.00 over items worth 30.00 / 30.00 / 30.00
    ///      │
    ///      ▼
    /// allocate(weights) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// 33.33 / 33.33 / 33.34   (Σ = 100.00 exactly)
    /// ```
    ///
    /// When all weights are zero the whole amount lands on the last share.
    pub fn allocate(&self, weights: &[Money]) -> Vec<Money> {
        if weights.is_empty() {
            return Vec::new();
        }

        let total_weight: i128 = weights.iter().map(|w| w.0 as i128).sum();
        let mut shares = Vec::with_capacity(weights.len());
        let mut allocated: i64 = 0;

        for weight in &weights[..weights.len() - 1] {
            let share = if total_weight == 0 {
                0
            } else {
                div_round_half_up(self.0 as i128 * weight.0 as i128, total_weight) as i64
            };
            allocated += share;
            shares.push(Money(share));
        }

        shares.push(Money(self.0 - allocated));
        shares
    }
}

/// Integer division rounding half away from zero (half-up on magnitude).
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let (n, d) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };
    if n >= 0 {
        (2 * n + d) / (2 * d)
    } else {
        -((-2 * n + d) / (2 * d))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering, e.g. `1250.50` or `-3.05`.
///
/// Currency symbols are a presentation concern and are not rendered here.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
