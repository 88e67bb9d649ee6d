//! # Domain Types
//!
//! Core domain types used throughout Medix.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Medicine     │◄──│      Batch      │◄──│    SaleLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  batch_number   │   │  batch_id       │       │
//! │  │  category       │   │  quantity ≥ 0   │   │  quantity       │       │
//! │  │  is_active      │   │  expiry_date    │   │  unit_price     │       │
//! │  └─────────────────┘   │  version        │   └────────┬────────┘       │
//! │                        └─────────────────┘            │ owned by       │
//! │                                               ┌───────▼────────┐       │
//! │  ┌─────────────────┐   ┌─────────────────┐    │      Sale      │       │
//! │  │ StockMovement   │   │   RefundLine    │───►│ invoice_number │       │
//! │  │ receipt / sale  │   │ sale_line_id    │    │ status, totals │       │
//! │  │ refund / adjust │   │ quantity        │    └────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (batch_number, invoice_number) - human-readable

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{DiscountRate, Money, TaxRate};

// =============================================================================
// Medicine Category
// =============================================================================

/// Dosage-form category of a medicine.
///
/// Closed set; free-form strings from the catalog UI are parsed with
/// [`FromStr`] at the boundary and anything unknown is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MedicineCategory {
    Tablet,
    Capsule,
    Syrup,
    Injection,
    Ointment,
    Drops,
    Inhaler,
    Other,
}

impl MedicineCategory {
    /// All categories, in display order.
    pub const ALL: [MedicineCategory; 8] = [
        MedicineCategory::Tablet,
        MedicineCategory::Capsule,
        MedicineCategory::Syrup,
        MedicineCategory::Injection,
        MedicineCategory::Ointment,
        MedicineCategory::Drops,
        MedicineCategory::Inhaler,
        MedicineCategory::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            MedicineCategory::Tablet => "tablet",
            MedicineCategory::Capsule => "capsule",
            MedicineCategory::Syrup => "syrup",
            MedicineCategory::Injection => "injection",
            MedicineCategory::Ointment => "ointment",
            MedicineCategory::Drops => "drops",
            MedicineCategory::Inhaler => "inhaler",
            MedicineCategory::Other => "other",
        }
    }
}

impl fmt::Display for MedicineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MedicineCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        MedicineCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: MedicineCategory::ALL
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Medicine
// =============================================================================

/// A catalog entry. Referenced (never owned) by batches and sale lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub category: MedicineCategory,
    pub requires_prescription: bool,
    /// Inactive medicines stay referenced by history but cannot be sold.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewMedicine {
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    pub category: MedicineCategory,
    #[serde(default)]
    pub requires_prescription: bool,
}

// =============================================================================
// Batch
// =============================================================================

/// A received lot of one medicine.
///
/// ## Invariants
/// - `quantity >= 0` at all times
/// - a batch with `quantity == 0` stays visible but is never allocated
/// - batches are never deleted, only exhausted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Batch {
    pub id: String,
    pub medicine_id: String,
    /// Supplier lot number, unique per medicine.
    pub batch_number: String,
    /// Quantity on hand.
    pub quantity: i64,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    #[ts(as = "String")]
    pub manufactured_date: NaiveDate,
    /// Unit sale price in cents.
    pub sale_price_cents: i64,
    /// Unit purchase cost in cents.
    pub purchase_cost_cents: i64,
    /// Optimistic concurrency counter, bumped on every quantity change.
    pub version: i64,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// Returns the unit sale price as Money.
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    /// Checks whether the batch has expired as of `today`.
    ///
    /// A batch expiring today is already unsellable.
    #[inline]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date <= today
    }

    /// Checks whether FEFO allocation may draw from this batch.
    #[inline]
    pub fn is_allocatable(&self, today: NaiveDate) -> bool {
        self.quantity > 0 && !self.is_expired(today)
    }
}

/// Incoming stock receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBatch {
    pub medicine_id: String,
    pub batch_number: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    #[ts(as = "String")]
    pub manufactured_date: NaiveDate,
    pub sale_price_cents: i64,
    pub purchase_cost_cents: i64,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a batch quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementReason {
    /// Stock received into a new batch.
    Receipt,
    /// Allocated to a committed sale.
    Sale,
    /// Restored by a refund.
    Refund,
    /// Manual correction (count, damage, recall).
    Adjustment,
}

/// Append-only audit entry for one ledger mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub batch_id: String,
    /// Signed quantity change (negative for sales).
    pub delta: i64,
    pub reason: MovementReason,
    /// Invoice number or free-text note.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a committed sale.
///
/// ## State Machine
/// ```text
///                  ┌──────────────────────┐
///  checkout ──►  completed ──► partially-refunded ──► refunded
///                  │                                     ▲
///                  └─────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum SaleStatus {
    /// Entry state of every checkout.
    Completed,
    /// Every sold unit has been reversed.
    Refunded,
    /// Some, but not all, units have been reversed.
    PartiallyRefunded,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Refunded => "refunded",
            SaleStatus::PartiallyRefunded => "partially-refunded",
        }
    }

    /// Checks whether a refund may still be recorded against the sale.
    #[inline]
    pub const fn accepts_refund(&self) -> bool {
        matches!(self, SaleStatus::Completed | SaleStatus::PartiallyRefunded)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid. A label only; nothing is processed.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileWallet,
    Insurance,
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "mobile_wallet" | "wallet" | "mobile" => Ok(PaymentMethod::MobileWallet),
            "insurance" => Ok(PaymentMethod::Insurance),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec![
                    "cash".to_string(),
                    "card".to_string(),
                    "mobile_wallet".to_string(),
                    "insurance".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Sale header. Totals always describe the amount currently owed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub invoice_number: String,
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_bps: u32,
    pub discount_cents: i64,
    pub vat_bps: u32,
    pub vat_cents: i64,
    pub total_cents: i64,
    /// Cumulative amount given back through refunds.
    pub refunded_cents: i64,
    pub payment_method: PaymentMethod,
    pub staff_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Sale {
    /// Returns the total owed as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the discount rate the sale was settled with.
    #[inline]
    pub fn discount_rate(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps).unwrap_or_default()
    }

    /// Returns the VAT rate the sale was settled with.
    #[inline]
    pub fn vat_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.vat_bps)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// One (medicine, batch) line of a sale.
///
/// A request spanning several batches yields several lines.
/// Name, batch number and price are frozen at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    /// Display order within the sale (0-based).
    pub line_no: i64,
    pub medicine_id: String,
    pub batch_id: String,
    pub medicine_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`.
    pub subtotal_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Refund Line
// =============================================================================

/// A reversal of some quantity of one sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RefundLine {
    pub id: String,
    pub sale_id: String,
    pub sale_line_id: String,
    pub quantity: i64,
    /// Whether the units went back into the original batch.
    pub restocked: bool,
    pub staff_id: String,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Record
// =============================================================================

/// A sale together with its lines and refund history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRecord {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub refunds: Vec<RefundLine>,
}

impl SaleRecord {
    /// Quantity refunded so far, per sale line id.
    pub fn refunded_quantities(&self) -> HashMap<&str, i64> {
        let mut refunded: HashMap<&str, i64> = HashMap::new();
        for refund in &self.refunds {
            *refunded.entry(refund.sale_line_id.as_str()).or_insert(0) += refund.quantity;
        }
        refunded
    }

    /// Quantity of a line that has not been refunded yet.
    pub fn remaining_quantity(&self, line: &SaleLine) -> i64 {
        let refunded = self
            .refunds
            .iter()
            .filter(|r| r.sale_line_id == line.id)
            .map(|r| r.quantity)
            .sum::<i64>();
        line.quantity - refunded
    }

    /// Total units sold across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
