//! # Money Module
//!
//! Provides the `Money` type for persisted monetary values and the rate
//! types (`TaxRate`, `DiscountRate`) used by the pricing calculator.
//!
//! ## Two Representations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PERSISTED VALUES: Money (integer cents)                                │
//! │    unit prices, line subtotals, sale totals                             │
//! │                                                                         │
//! │  INTERMEDIATES: rust_decimal::Decimal (exact, full precision)           │
//! │    subtotal × 12.5% discount = 1234.5625  (kept as is)                  │
//! │    taxable × 13% VAT         = 143.98...  (kept as is)                  │
//! │                                                                         │
//! │  Decimal → Money happens exactly once, when totals are settled.         │
//! │  Binary floating point is never used for money.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use medix_core::money::Money;
//!
//! let price = Money::from_cents(1099);
//! let line = price * 3;
//! assert_eq!(line.cents(), 3297);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Decimal places kept when a value is persisted.
pub const CURRENCY_SCALE: u32 = 2;

const BPS_PER_UNIT: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (paisa / cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds are expressed as differences of totals
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use medix_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.checked_mul(3), Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul(2), None);
    /// ```
    #[inline]
    pub const fn checked_mul(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns the exact decimal value in major units (1099 cents → 10.99).
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, CURRENCY_SCALE)
    }

    /// Rounds a full-precision decimal to cents.
    ///
    /// Uses midpoint-away-from-zero: 0.125 → 0.13, -0.125 → -0.13.
    /// Values beyond the i64 range saturate; see [`Money::try_from_decimal`].
    ///
    /// ## Example
    /// ```rust
    /// use medix_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let exact = Decimal::new(1234565, 5); // 12.34565
    /// assert_eq!(Money::from_decimal(exact).cents(), 1235);
    /// ```
    pub fn from_decimal(value: Decimal) -> Self {
        Self::try_from_decimal(value).unwrap_or(if value.is_sign_negative() {
            Money(i64::MIN)
        } else {
            Money(i64::MAX)
        })
    }

    /// Rounds like [`Money::from_decimal`], `None` when the result does not
    /// fit in i64 cents.
    pub fn try_from_decimal(value: Decimal) -> Option<Self> {
        let mut rounded =
            value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(CURRENCY_SCALE);
        i64::try_from(rounded.mantissa()).ok().map(Money)
    }
}

/// Shows money as a plain two-decimal amount ("10.99").
///
/// ## Note
/// Single currency only; the UI adds the currency label.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
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
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1300 bps = 13% VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as an exact fraction (1300 bps → 0.13).
    #[inline]
    pub fn as_fraction(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(BPS_PER_UNIT)
    }
}

// =============================================================================
// Discount Rate
// =============================================================================

/// Flat sale-level discount, stored in basis points (0..=10000).
///
/// ## Boundary Conversion
/// ```text
/// Request: discount_pct = "12.5"
///      │
///      ▼
/// DiscountRate::from_percentage(12.5) ← validates range + precision
///      │
///      ▼
/// DiscountRate(1250)  → persisted as sales.discount_bps
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// No discount.
    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    /// Creates a discount from basis points, rejecting anything above 100%.
    pub fn from_bps(bps: u32) -> ValidationResult<Self> {
        if i64::from(bps) > BPS_PER_UNIT {
            return Err(ValidationError::OutOfRange {
                field: "discount_pct".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(DiscountRate(bps))
    }

    /// Creates a discount from a percentage such as `12.5`.
    ///
    /// ## Rules
    /// - Must be within [0, 100]
    /// - At most two decimal places (the persisted resolution)
    ///
    /// ## Example
    /// ```rust
    /// use medix_core::money::DiscountRate;
    /// use rust_decimal::Decimal;
    ///
    /// let rate = DiscountRate::from_percentage(Decimal::new(125, 1)).unwrap();
    /// assert_eq!(rate.bps(), 1250);
    /// assert!(DiscountRate::from_percentage(Decimal::from(101)).is_err());
    /// ```
    pub fn from_percentage(pct: Decimal) -> ValidationResult<Self> {
        if pct.is_sign_negative() && !pct.is_zero() || pct > Decimal::ONE_HUNDRED {
            return Err(ValidationError::OutOfRange {
                field: "discount_pct".to_string(),
                min: 0,
                max: 100,
            });
        }

        let bps = pct * Decimal::ONE_HUNDRED;
        if !bps.fract().is_zero() {
            return Err(ValidationError::InvalidFormat {
                field: "discount_pct".to_string(),
                reason: "at most two decimal places are allowed".to_string(),
            });
        }

        let bps = bps.to_u32().ok_or_else(|| ValidationError::OutOfRange {
            field: "discount_pct".to_string(),
            min: 0,
            max: 100,
        })?;
        DiscountRate::from_bps(bps)
    }

    /// Returns the discount in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the discount as an exact fraction (1250 bps → 0.125).
    pub fn as_fraction(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(BPS_PER_UNIT)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
