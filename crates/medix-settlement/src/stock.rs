//! # Stock Receipts and Adjustments
//!
//! The two ledger mutations that are neither a sale nor a refund, plus the
//! read-only stock views the till shows.
//!
//! ```text
//! receive_batch ──► new batch (version 0) + `receipt` movement
//! adjust_stock  ──► guarded quantity change + `adjustment` movement
//!                   (never below zero; lost races retried)
//! stock_level   ──► every batch of a medicine, on hand vs. sellable today
//! ```

use medix_core::validation::validate_receipt;
use medix_core::{Batch, Medicine, MovementReason, NewBatch, ValidationError, MAX_BATCH_QUANTITY};
use medix_db::{BatchRepository, DbError, MedicineRepository};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::engine::SettlementEngine;
use crate::error::{SettlementError, SettlementResult};

const MAX_NOTE_LENGTH: usize = 200;

/// Stock position of one medicine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub medicine: Medicine,
    /// Units held across all batches, expired ones included.
    pub on_hand: i64,
    /// Units checkout may allocate today.
    pub sellable: i64,
    /// All batches in FEFO order.
    pub batches: Vec<Batch>,
}

impl SettlementEngine {
    /// Receives a delivered batch into stock.
    ///
    /// ## Returns
    /// * `Ok(Batch)` - The stored batch
    /// * `Err(InvalidInput)` - Bad receipt fields, or the batch number is
    ///   already used for this medicine
    /// * `Err(MedicineNotFound)` - Unknown medicine
    pub async fn receive_batch(
        &self,
        receipt: &NewBatch,
        reference: Option<&str>,
    ) -> SettlementResult<Batch> {
        validate_receipt(
            &receipt.batch_number,
            receipt.quantity,
            receipt.manufactured_date,
            receipt.expiry_date,
            receipt.sale_price_cents,
            receipt.purchase_cost_cents,
        )?;

        let batch = self
            .retry
            .run("receive_batch", |attempt| self.receive_attempt(receipt, reference, attempt))
            .await?;

        info!(
            batch_id = %batch.id,
            medicine_id = %batch.medicine_id,
            batch_number = %batch.batch_number,
            quantity = batch.quantity,
            expiry = %batch.expiry_date,
            "Batch received"
        );

        Ok(batch)
    }

    async fn receive_attempt(
        &self,
        receipt: &NewBatch,
        reference: Option<&str>,
        attempt: u32,
    ) -> SettlementResult<Batch> {
        debug!(attempt, batch_number = %receipt.batch_number, "Receive attempt");

        let mut tx = self.db.pool().begin().await?;

        if MedicineRepository::find_tx(&mut *tx, &receipt.medicine_id)
            .await?
            .is_none()
        {
            return Err(SettlementError::MedicineNotFound {
                medicine_id: receipt.medicine_id.clone(),
            });
        }

        let batch = match BatchRepository::receive_tx(&mut *tx, receipt, reference).await {
            Ok(batch) => batch,
            Err(e) if e.is_unique_violation_on("batch_number") => {
                return Err(ValidationError::Duplicate {
                    field: "batch_number".to_string(),
                    value: receipt.batch_number.trim().to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(batch)
    }

    /// Applies a signed correction to one batch (stock count, breakage,
    /// write-off).
    ///
    /// ## Returns
    /// * `Ok(Batch)` - The batch after the correction
    /// * `Err(InvalidInput)` - Zero delta, or the batch would go negative or
    ///   above `MAX_BATCH_QUANTITY`
    /// * `Err(BatchNotFound)` - Unknown batch
    pub async fn adjust_stock(
        &self,
        batch_id: &str,
        delta: i64,
        note: Option<&str>,
    ) -> SettlementResult<Batch> {
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }
        if !(-MAX_BATCH_QUANTITY..=MAX_BATCH_QUANTITY).contains(&delta) {
            return Err(ValidationError::OutOfRange {
                field: "delta".to_string(),
                min: -MAX_BATCH_QUANTITY,
                max: MAX_BATCH_QUANTITY,
            }
            .into());
        }
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
            return Err(ValidationError::TooLong {
                field: "note".to_string(),
                max: MAX_NOTE_LENGTH,
            }
            .into());
        }

        let batch = self
            .retry
            .run("adjust_stock", |attempt| self.adjust_attempt(batch_id, delta, note, attempt))
            .await?;

        info!(
            batch_id = %batch.id,
            delta,
            quantity = batch.quantity,
            "Stock adjusted"
        );

        Ok(batch)
    }

    async fn adjust_attempt(
        &self,
        batch_id: &str,
        delta: i64,
        note: Option<&str>,
        attempt: u32,
    ) -> SettlementResult<Batch> {
        debug!(attempt, batch_id = %batch_id, delta, "Adjust attempt");

        let mut tx = self.db.pool().begin().await?;

        let batch = BatchRepository::find_tx(&mut *tx, batch_id)
            .await?
            .ok_or_else(|| SettlementError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })?;

        let adjusted_quantity = batch.quantity.saturating_add(delta);
        if !(0..=MAX_BATCH_QUANTITY).contains(&adjusted_quantity) {
            return Err(ValidationError::OutOfRange {
                field: "delta".to_string(),
                min: -batch.quantity,
                max: MAX_BATCH_QUANTITY.saturating_sub(batch.quantity),
            }
            .into());
        }

        BatchRepository::adjust_tx(&mut *tx, &batch.id, delta, batch.version).await?;
        BatchRepository::record_movement_tx(
            &mut *tx,
            &batch.id,
            delta,
            MovementReason::Adjustment,
            note.map(str::trim).filter(|n| !n.is_empty()),
        )
        .await?;

        let adjusted = BatchRepository::find_tx(&mut *tx, &batch.id)
            .await?
            .ok_or_else(|| DbError::not_found("Batch", &batch.id))?;

        tx.commit().await?;
        Ok(adjusted)
    }
}

impl SettlementEngine {
    /// Reports every batch of a medicine and how much of it can be sold today.
    ///
    /// ## Returns
    /// * `Err(MedicineNotFound)` - Unknown medicine
    pub async fn stock_level(&self, medicine_id: &str) -> SettlementResult<StockLevel> {
        let medicine = self
            .db
            .medicines()
            .get_by_id(medicine_id)
            .await?
            .ok_or_else(|| SettlementError::MedicineNotFound {
                medicine_id: medicine_id.to_string(),
            })?;

        let repo = self.db.batches();
        let on_hand = repo.quantity_on_hand(&medicine.id).await?;
        let sellable = repo
            .available_for_medicine(&medicine.id, self.clock.today())
            .await?
            .iter()
            .fold(0i64, |total, b| total.saturating_add(b.quantity));
        let batches = repo.list_for_medicine(&medicine.id).await?;

        Ok(StockLevel {
            medicine,
            on_hand,
            sellable,
            batches,
        })
    }

    /// Medicines that can currently be sold, by name.
    pub async fn active_medicines(&self) -> SettlementResult<Vec<Medicine>> {
        Ok(self.db.medicines().list_active().await?)
    }
}
