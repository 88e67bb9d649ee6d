//! # FEFO Allocation Engine
//!
//! Decides which batches a requested quantity of a medicine is drawn from.
//!
//! ## First-Expiry-First-Out
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request: Paracetamol × 8          today = 2024-12-01                   │
//! │                                                                         │
//! │  Batches (sorted by expiry, then batch number, then id)                │
//! │  ┌──────────┬────────────┬──────┐                                       │
//! │  │ B0       │ 2024-11-30 │  20  │  ✗ expired                            │
//! │  │ B1       │ 2025-01-01 │   5  │  ✓ take 5   (remaining 3)             │
//! │  │ B2       │ 2025-06-01 │  10  │  ✓ take 3   (remaining 0)             │
//! │  │ B3       │ 2026-01-01 │   0  │  ✗ empty                              │
//! │  └──────────┴────────────┴──────┘                                       │
//! │                                                                         │
//! │  Result: [(B1, 5), (B2, 3)]                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocation is all-or-nothing: when the eligible batches cannot cover the
//! request, nothing is allocated and [`CoreError::InsufficientStock`] carries
//! the quantity that *is* available.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Batch;

// =============================================================================
// Allocation
// =============================================================================

/// One slice of a request satisfied from a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub batch_id: String,
    pub batch_number: String,
    pub medicine_id: String,
    pub quantity: i64,
    /// Batch sale price at allocation time.
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
}

/// Total FEFO order over batches: expiry, then batch number, then id.
fn fefo_order(a: &Batch, b: &Batch) -> Ordering {
    a.expiry_date
        .cmp(&b.expiry_date)
        .then_with(|| a.batch_number.cmp(&b.batch_number))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sums batch quantities, saturating at `i64::MAX`.
fn total_quantity<'a>(batches: impl Iterator<Item = &'a Batch>) -> i64 {
    batches.fold(0i64, |total, b| total.saturating_add(b.quantity))
}

/// Allocates `requested` units of `medicine_id` from `batches`.
///
/// Batches belonging to other medicines, empty batches and batches expiring
/// on or before `today` are ignored. The input order does not matter.
///
/// ## Errors
/// - [`ValidationError::MustBePositive`] when `requested <= 0`
/// - [`CoreError::InsufficientStock`] when eligible stock is short
///
/// ## Example
/// ```rust,ignore
/// let allocations = allocate("med-1", 8, &batches, today)?;
/// assert_eq!(allocations.iter().map(|a| a.quantity).sum::<i64>(), 8);
/// ```
pub fn allocate(
    medicine_id: &str,
    requested: i64,
    batches: &[Batch],
    today: NaiveDate,
) -> CoreResult<Vec<Allocation>> {
    if requested <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    let mut eligible: Vec<&Batch> = batches
        .iter()
        .filter(|b| b.medicine_id == medicine_id && b.is_allocatable(today))
        .collect();
    eligible.sort_by(|a, b| fefo_order(a, b));

    let available = total_quantity(eligible.iter().copied());
    if available < requested {
        return Err(CoreError::InsufficientStock {
            medicine_id: medicine_id.to_string(),
            available,
            requested,
        });
    }

    let mut remaining = requested;
    let mut allocations = Vec::new();

    for batch in eligible {
        if remaining == 0 {
            break;
        }

        let take = remaining.min(batch.quantity);
        allocations.push(Allocation {
            batch_id: batch.id.clone(),
            batch_number: batch.batch_number.clone(),
            medicine_id: batch.medicine_id.clone(),
            quantity: take,
            unit_price_cents: batch.sale_price_cents,
            expiry_date: batch.expiry_date,
        });
        remaining -= take;
    }

    Ok(allocations)
}

// =============================================================================
// Stock Snapshot
// =============================================================================

/// In-memory copy of the ledger used while settling one cart.
///
/// Successive [`StockSnapshot::allocate`] calls see the quantities left
/// behind by earlier ones, so two cart lines for the same medicine never
/// count the same units twice.
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    today: NaiveDate,
    batches: HashMap<String, Vec<Batch>>,
}

impl StockSnapshot {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            batches: HashMap::new(),
        }
    }

    /// Loads (or replaces) the batches of one medicine.
    pub fn insert(&mut self, medicine_id: impl Into<String>, batches: Vec<Batch>) {
        self.batches.insert(medicine_id.into(), batches);
    }

    /// Quantity still allocatable for a medicine.
    pub fn available(&self, medicine_id: &str) -> i64 {
        self.batches
            .get(medicine_id)
            .map(|batches| {
                total_quantity(batches.iter().filter(|b| b.is_allocatable(self.today)))
            })
            .unwrap_or(0)
    }

    /// Allocates against the snapshot and deducts the result from it.
    ///
    /// On error the snapshot is left untouched.
    pub fn allocate(&mut self, medicine_id: &str, requested: i64) -> CoreResult<Vec<Allocation>> {
        let batches = self
            .batches
            .get_mut(medicine_id)
            .map(|b| b.as_mut_slice())
            .unwrap_or_default();

        let allocations = allocate(medicine_id, requested, batches, self.today)?;

        for allocation in &allocations {
            if let Some(batch) = batches.iter_mut().find(|b| b.id == allocation.batch_id) {
                batch.quantity -= allocation.quantity;
            }
        }

        Ok(allocations)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
