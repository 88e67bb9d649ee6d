//! # Pricing Calculator
//!
//! Turns a set of (quantity, unit price) lines plus a discount rate into a
//! subtotal / discount / VAT / total breakdown.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► subtotal = Σ qty × unit                                      │
//! │                │                                                        │
//! │                ├──► discount = subtotal × pct / 100                     │
//! │                │                                                        │
//! │                ▼                                                        │
//! │            taxable = subtotal − discount                                │
//! │                │                                                        │
//! │                ├──► vat = taxable × 13%                                 │
//! │                ▼                                                        │
//! │            total = taxable + vat                                        │
//! │                                                                         │
//! │  Decimal, full precision ──────────────► settle() rounds to cents      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounding is midpoint-away-from-zero and happens once, in
//! [`PricingBreakdown::settle`]. The settled total is derived from the
//! rounded components, so `total == subtotal - discount + vat` holds exactly
//! in cents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{DiscountRate, Money, TaxRate};
use crate::validation::ValidationResult;

// =============================================================================
// Line Amount
// =============================================================================

/// Pricing input for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub quantity: i64,
    pub unit_price: Money,
}

impl LineAmount {
    pub const fn new(quantity: i64, unit_price: Money) -> Self {
        Self {
            quantity,
            unit_price,
        }
    }

    /// `quantity × unit_price`, exact in cents.
    #[inline]
    pub fn subtotal(&self) -> ValidationResult<Money> {
        self.unit_price
            .checked_mul(self.quantity)
            .ok_or_else(|| too_large("subtotal"))
    }
}

// =============================================================================
// Breakdown
// =============================================================================

/// Unrounded pricing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub taxable: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

/// Pricing result rounded to cents, ready to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettledTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub vat: Money,
    pub total: Money,
}

impl PricingBreakdown {
    /// Rounds each component to cents and rebuilds the total from them.
    pub fn settle(&self) -> SettledTotals {
        let subtotal = Money::from_decimal(self.subtotal);
        let discount = Money::from_decimal(self.discount);
        let vat = Money::from_decimal(self.vat);

        SettledTotals {
            subtotal,
            discount,
            vat,
            total: subtotal - discount + vat,
        }
    }
}

/// Prices a set of lines.
///
/// An empty slice prices to all zeros (a fully refunded sale). Fails with
/// [`ValidationError::InvalidFormat`] when an amount does not fit in i64
/// cents.
///
/// ## Example
/// ```rust
/// use medix_core::money::{DiscountRate, Money};
/// use medix_core::pricing::{price_lines, LineAmount};
/// use medix_core::VAT_RATE;
/// use rust_decimal::Decimal;
///
/// let lines = [LineAmount::new(3, Money::from_cents(333))];
/// let discount = DiscountRate::from_percentage(Decimal::new(10, 0)).unwrap();
/// let totals = price_lines(&lines, discount, VAT_RATE).unwrap().settle();
///
/// assert_eq!(totals.subtotal.cents(), 999);
/// assert_eq!(totals.discount.cents(), 100); // 99.9 rounds up
/// assert_eq!(totals.vat.cents(), 117);      // 899.1 × 0.13 = 116.883
/// assert_eq!(totals.total.cents(), 1016);
/// ```
pub fn price_lines(
    lines: &[LineAmount],
    discount: DiscountRate,
    vat: TaxRate,
) -> ValidationResult<PricingBreakdown> {
    let mut subtotal = Money::zero();
    for line in lines {
        subtotal = subtotal
            .checked_add(line.subtotal()?)
            .ok_or_else(|| too_large("subtotal"))?;
    }

    let subtotal = subtotal.to_decimal();
    let discount_amount = subtotal * discount.as_fraction();
    let taxable = subtotal - discount_amount;
    let vat_amount = taxable * vat.as_fraction();
    let total = taxable + vat_amount;

    // Every settled component is bounded by the total
    if Money::try_from_decimal(total).is_none() {
        return Err(too_large("total"));
    }

    Ok(PricingBreakdown {
        subtotal,
        discount: discount_amount,
        taxable,
        vat: vat_amount,
        total,
    })
}

fn too_large(field: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "amount is too large".to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
