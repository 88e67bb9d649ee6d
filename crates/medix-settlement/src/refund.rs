//! # Refund
//!
//! Reverses some or all of a committed sale.
//!
//! ## Refund State Machine
//! ```text
//!                 ┌──────── partial ────────┐        ┌── partial ──┐
//!                 │                         ▼        │             ▼
//!   checkout ──► completed            partially-refunded ◄─────────┘
//!                 │                         │
//!                 └──── everything left ────┴──► refunded (final)
//! ```
//!
//! ## What A Refund Writes
//! - One `RefundLine` per reversed sale line (sale lines never change)
//! - With `RestockPolicy::Restore`: the quantity back into the original
//!   batch plus a `refund` movement
//! - New header totals, priced over what remains at the sale's own
//!   discount and VAT rate, under the sale's `version` guard

use std::collections::{BTreeMap, HashMap, HashSet};

use medix_core::validation::{validate_line_count, validate_staff_id, ValidationResult};
use medix_core::{
    price_lines, LineAmount, MovementReason, RefundLine, SaleLine, SaleRecord, SaleStatus,
    ValidationError,
};
use medix_db::repository::sale::generate_refund_line_id;
use medix_db::{BatchRepository, RefundedTotals, SaleRepository};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::engine::SettlementEngine;
use crate::error::{SettlementError, SettlementResult};

const MAX_REASON_LENGTH: usize = 500;

// =============================================================================
// Request DTOs
// =============================================================================

/// What happens to returned units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RestockPolicy {
    /// Units go back into the batch they were sold from.
    #[default]
    Restore,
    /// Units are written off (damaged, opened, cold chain broken).
    Unsellable,
}

/// Reverse `quantity` units of one sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundLineRequest {
    pub sale_line_id: String,
    pub quantity: i64,
}

/// A refund against one invoice.
///
/// `lines: None` reverses everything that has not been refunded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundRequest {
    pub invoice_number: String,
    #[serde(default)]
    pub lines: Option<Vec<RefundLineRequest>>,
    #[serde(default)]
    pub restock: RestockPolicy,
    pub staff_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl RefundRequest {
    /// Refunds everything remaining on `invoice_number` into stock.
    pub fn full(invoice_number: impl Into<String>, staff_id: impl Into<String>) -> Self {
        RefundRequest {
            invoice_number: invoice_number.into(),
            lines: None,
            restock: RestockPolicy::Restore,
            staff_id: staff_id.into(),
            reason: None,
        }
    }

    /// Narrows the refund to explicit lines.
    pub fn line(mut self, sale_line_id: impl Into<String>, quantity: i64) -> Self {
        self.lines.get_or_insert_with(Vec::new).push(RefundLineRequest {
            sale_line_id: sale_line_id.into(),
            quantity,
        });
        self
    }

    pub fn restock(mut self, policy: RestockPolicy) -> Self {
        self.restock = policy;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Checks everything that can be checked without reading the sale.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.invoice_number.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "invoice_number".to_string(),
            });
        }

        validate_staff_id(&self.staff_id)?;

        if let Some(reason) = &self.reason {
            if reason.chars().count() > MAX_REASON_LENGTH {
                return Err(ValidationError::TooLong {
                    field: "reason".to_string(),
                    max: MAX_REASON_LENGTH,
                });
            }
        }

        if let Some(lines) = &self.lines {
            validate_line_count("lines", lines.len())?;

            let mut seen = HashSet::new();
            for line in lines {
                if line.sale_line_id.trim().is_empty() {
                    return Err(ValidationError::Required {
                        field: "sale_line_id".to_string(),
                    });
                }
                if line.quantity <= 0 {
                    return Err(ValidationError::MustBePositive {
                        field: "quantity".to_string(),
                    });
                }
                if !seen.insert(line.sale_line_id.as_str()) {
                    return Err(ValidationError::Duplicate {
                        field: "sale_line_id".to_string(),
                        value: line.sale_line_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Refund
// =============================================================================

impl SettlementEngine {
    /// Records a refund and returns the updated sale.
    ///
    /// ## Returns
    /// * `Ok(SaleRecord)` - Header totals now describe what is still owed
    /// * `Err(SaleNotFound)` - Unknown invoice number
    /// * `Err(InvalidSaleStatus)` - The sale is already fully refunded
    /// * `Err(InvalidInput)` - Unknown line, or more than remains on a line
    pub async fn refund(&self, request: &RefundRequest) -> SettlementResult<SaleRecord> {
        request.validate()?;

        let record = self
            .retry
            .run("refund", |attempt| self.refund_attempt(request, attempt))
            .await?;

        info!(
            invoice = %record.sale.invoice_number,
            status = %record.sale.status,
            total = %record.sale.total(),
            refunded_cents = record.sale.refunded_cents,
            restock = ?request.restock,
            "Refund recorded"
        );

        Ok(record)
    }

    async fn refund_attempt(
        &self,
        request: &RefundRequest,
        attempt: u32,
    ) -> SettlementResult<SaleRecord> {
        let now = self.clock.now();
        let invoice_number = request.invoice_number.trim();
        debug!(attempt, invoice = %invoice_number, "Refund attempt");

        let mut tx = self.db.pool().begin().await?;

        let record = SaleRepository::record_tx(&mut *tx, invoice_number)
            .await?
            .ok_or_else(|| SettlementError::SaleNotFound {
                invoice_number: invoice_number.to_string(),
            })?;

        if !record.sale.status.accepts_refund() {
            return Err(SettlementError::InvalidSaleStatus {
                invoice_number: record.sale.invoice_number.clone(),
                status: record.sale.status,
            });
        }

        let reversals = plan_reversals(&record, request.lines.as_deref())?;
        if reversals.is_empty() {
            return Err(ValidationError::Empty {
                field: "lines".to_string(),
            }
            .into());
        }

        let restocked = request.restock == RestockPolicy::Restore;
        if restocked {
            let mut per_batch: BTreeMap<&str, i64> = BTreeMap::new();
            for (line, quantity) in &reversals {
                *per_batch.entry(line.batch_id.as_str()).or_insert(0) += quantity;
            }

            for (batch_id, amount) in &per_batch {
                BatchRepository::restore_tx(&mut *tx, batch_id, *amount).await?;
                BatchRepository::record_movement_tx(
                    &mut *tx,
                    batch_id,
                    *amount,
                    MovementReason::Refund,
                    Some(invoice_number),
                )
                .await?;
            }
        }

        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let refund_lines: Vec<RefundLine> = reversals
            .iter()
            .map(|(line, quantity)| RefundLine {
                id: generate_refund_line_id(),
                sale_id: record.sale.id.clone(),
                sale_line_id: line.id.clone(),
                quantity: *quantity,
                restocked,
                staff_id: request.staff_id.trim().to_string(),
                reason: reason.clone(),
                created_at: now,
            })
            .collect();
        SaleRepository::insert_refunds_tx(&mut *tx, &refund_lines).await?;

        let totals = totals_after(&record, &reversals)?;
        SaleRepository::update_after_refund_tx(
            &mut *tx,
            &record.sale.id,
            record.sale.version,
            &totals,
        )
        .await?;

        let updated = SaleRepository::record_tx(&mut *tx, invoice_number)
            .await?
            .ok_or_else(|| SettlementError::SaleNotFound {
                invoice_number: invoice_number.to_string(),
            })?;

        tx.commit().await?;

        Ok(updated)
    }
}

/// Resolves the requested lines against the sale.
///
/// `None` picks every line with something left to refund.
fn plan_reversals<'a>(
    record: &'a SaleRecord,
    requested: Option<&[RefundLineRequest]>,
) -> SettlementResult<Vec<(&'a SaleLine, i64)>> {
    let Some(requested) = requested else {
        return Ok(record
            .lines
            .iter()
            .map(|line| (line, record.remaining_quantity(line)))
            .filter(|(_, remaining)| *remaining > 0)
            .collect());
    };

    requested
        .iter()
        .map(|req| -> SettlementResult<(&'a SaleLine, i64)> {
            let line = record
                .lines
                .iter()
                .find(|l| l.id == req.sale_line_id)
                .ok_or_else(|| ValidationError::InvalidFormat {
                    field: "sale_line_id".to_string(),
                    reason: format!(
                        "{} is not a line of {}",
                        req.sale_line_id, record.sale.invoice_number
                    ),
                })?;

            let remaining = record.remaining_quantity(line);
            if req.quantity > remaining {
                return Err(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 1,
                    max: remaining,
                }
                .into());
            }

            Ok((line, req.quantity))
        })
        .collect()
}

/// Reprices what is still owed once `reversals` are applied.
fn totals_after(
    record: &SaleRecord,
    reversals: &[(&SaleLine, i64)],
) -> SettlementResult<RefundedTotals> {
    let mut reversed_now: HashMap<&str, i64> = HashMap::new();
    for (line, quantity) in reversals {
        *reversed_now.entry(line.id.as_str()).or_insert(0) += quantity;
    }

    let remaining: Vec<LineAmount> = record
        .lines
        .iter()
        .map(|line| {
            let left = record.remaining_quantity(line)
                - reversed_now.get(line.id.as_str()).copied().unwrap_or(0);
            LineAmount::new(left, line.unit_price())
        })
        .filter(|amount| amount.quantity > 0)
        .collect();

    let settled =
        price_lines(&remaining, record.sale.discount_rate(), record.sale.vat_rate())?.settle();
    let status = if remaining.is_empty() {
        SaleStatus::Refunded
    } else {
        SaleStatus::PartiallyRefunded
    };

    let refunded_now = record.sale.total_cents - settled.total.cents();

    Ok(RefundedTotals {
        status,
        subtotal_cents: settled.subtotal.cents(),
        discount_cents: settled.discount.cents(),
        vat_cents: settled.vat.cents(),
        total_cents: settled.total.cents(),
        refunded_cents: record.sale.refunded_cents + refunded_now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medix_core::{PaymentMethod, Sale, VAT_RATE};

    fn sale_line(id: &str, quantity: i64, unit_price_cents: i64) -> SaleLine {
        SaleLine {
            id: id.to_string(),
            sale_id: "s-1".to_string(),
            line_no: 0,
            medicine_id: "m-1".to_string(),
            batch_id: format!("b-{id}"),
            medicine_name: "Paracetamol 500mg".to_string(),
            batch_number: "LOT-1".to_string(),
            quantity,
            unit_price_cents,
            subtotal_cents: quantity * unit_price_cents,
            created_at: Utc::now(),
        }
    }

    /// 5 × 2.00 + 3 × 4.00 = 22.00, 10% off, 13% VAT → 22.37
    fn record() -> SaleRecord {
        let now = Utc::now();
        SaleRecord {
            sale: Sale {
                id: "s-1".to_string(),
                invoice_number: "INV-250101-0000ABCD".to_string(),
                customer_name: None,
                customer_mobile: None,
                status: SaleStatus::Completed,
                subtotal_cents: 2200,
                discount_bps: 1000,
                discount_cents: 220,
                vat_bps: VAT_RATE.bps(),
                vat_cents: 257,
                total_cents: 2237,
                refunded_cents: 0,
                payment_method: PaymentMethod::Cash,
                staff_id: "staff-1".to_string(),
                created_at: now,
                updated_at: now,
                version: 0,
            },
            lines: vec![sale_line("l-1", 5, 200), sale_line("l-2", 3, 400)],
            refunds: Vec::new(),
        }
    }

    #[test]
    fn test_validate_request() {
        assert!(RefundRequest::full("INV-1", "staff-1").validate().is_ok());
        assert!(RefundRequest::full(" ", "staff-1").validate().is_err());

        let zero = RefundRequest::full("INV-1", "staff-1").line("l-1", 0);
        assert!(matches!(zero.validate(), Err(ValidationError::MustBePositive { .. })));

        let dup = RefundRequest::full("INV-1", "staff-1").line("l-1", 1).line("l-1", 1);
        assert!(matches!(dup.validate(), Err(ValidationError::Duplicate { .. })));

        let long = RefundRequest::full("INV-1", "staff-1").reason("x".repeat(501));
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_plan_all_remaining() {
        let mut record = record();
        record.refunds.push(RefundLine {
            id: "r-1".to_string(),
            sale_id: "s-1".to_string(),
            sale_line_id: "l-1".to_string(),
            quantity: 5,
            restocked: true,
            staff_id: "staff-1".to_string(),
            reason: None,
            created_at: Utc::now(),
        });

        let plan = plan_reversals(&record, None).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0.id, "l-2");
        assert_eq!(plan[0].1, 3);
    }

    #[test]
    fn test_plan_rejects_unknown_and_excess() {
        let record = record();

        let unknown = [RefundLineRequest {
            sale_line_id: "l-9".to_string(),
            quantity: 1,
        }];
        assert!(matches!(
            plan_reversals(&record, Some(&unknown[..])),
            Err(SettlementError::InvalidInput(ValidationError::InvalidFormat { .. }))
        ));

        let excess = [RefundLineRequest {
            sale_line_id: "l-2".to_string(),
            quantity: 4,
        }];
        assert!(matches!(
            plan_reversals(&record, Some(&excess[..])),
            Err(SettlementError::InvalidInput(ValidationError::OutOfRange { max: 3, .. }))
        ));
    }

    #[test]
    fn test_totals_after_partial_refund() {
        let record = record();
        let plan = plan_reversals(
            &record,
            Some(
                &[RefundLineRequest {
                    sale_line_id: "l-2".to_string(),
                    quantity: 3,
                }][..],
            ),
        )
        .unwrap();

        // Remaining 5 × 2.00 = 10.00, discount 1.00, VAT 13% of 9.00 = 1.17
        let totals = totals_after(&record, &plan).unwrap();
        assert_eq!(totals.status, SaleStatus::PartiallyRefunded);
        assert_eq!(totals.subtotal_cents, 1000);
        assert_eq!(totals.discount_cents, 100);
        assert_eq!(totals.vat_cents, 117);
        assert_eq!(totals.total_cents, 1017);
        assert_eq!(totals.refunded_cents, 2237 - 1017);
    }

    #[test]
    fn test_totals_after_full_refund() {
        let record = record();
        let plan = plan_reversals(&record, None).unwrap();

        let totals = totals_after(&record, &plan).unwrap();
        assert_eq!(totals.status, SaleStatus::Refunded);
        assert_eq!(totals.total_cents, 0);
        assert_eq!(totals.subtotal_cents, 0);
        assert_eq!(totals.refunded_cents, 2237);
    }
}
