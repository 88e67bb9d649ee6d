//! # Batch Ledger Repository
//!
//! Stock on hand, one row per received batch, plus the append-only
//! movement log.
//!
//! ## Optimistic Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Guarded Decrement                                    │
//! │                                                                         │
//! │  read:   B1 { quantity: 10, version: 3 }                                │
//! │                                                                         │
//! │  write:  UPDATE batches                                                 │
//! │          SET quantity = quantity - 6, version = version + 1             │
//! │          WHERE id = 'B1' AND version = 3 AND quantity >= 6              │
//! │                                                                         │
//! │  rows_affected = 1  → ours, version is now 4                            │
//! │  rows_affected = 0  → someone else moved B1 first → StaleVersion        │
//! │                       (caller rolls back and retries the whole unit)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions suffixed `_tx` run on a caller-supplied connection so that
//! they can join a wider transaction; the rest open their own.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medix_core::{Batch, MovementReason, NewBatch, StockMovement};

const BATCH_COLUMNS: &str = r#"
    id,
    medicine_id,
    batch_number,
    quantity,
    expiry_date,
    manufactured_date,
    sale_price_cents,
    purchase_cost_cents,
    version,
    received_at,
    updated_at
"#;

/// Repository for the batch ledger.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a batch by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Batch>> {
        Self::find_tx(&self.pool, id).await
    }

    /// Looks a batch up on any executor.
    pub async fn find_tx<'e, E>(executor: E, id: &str) -> DbResult<Option<Batch>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?1");
        let batch = sqlx::query_as::<_, Batch>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(batch)
    }

    /// Every batch of a medicine in FEFO order, including empty and
    /// expired ones.
    pub async fn list_for_medicine(&self, medicine_id: &str) -> DbResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE medicine_id = ?1 \
             ORDER BY expiry_date, batch_number, id"
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(medicine_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    /// Batches of a medicine that allocation may draw from.
    pub async fn available_for_medicine(
        &self,
        medicine_id: &str,
        today: NaiveDate,
    ) -> DbResult<Vec<Batch>> {
        Self::available_tx(&self.pool, medicine_id, today).await
    }

    /// Reads the allocatable batches of a medicine: `quantity > 0` and
    /// expiring strictly after `today`, in FEFO order.
    pub async fn available_tx<'e, E>(
        executor: E,
        medicine_id: &str,
        today: NaiveDate,
    ) -> DbResult<Vec<Batch>>
    where
        E: SqliteExecutor<'e>,
    {
        debug!(medicine_id = %medicine_id, %today, "Loading available batches");

        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches \
             WHERE medicine_id = ?1 AND quantity > 0 AND expiry_date > ?2 \
             ORDER BY expiry_date, batch_number, id"
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(medicine_id)
            .bind(today)
            .fetch_all(executor)
            .await?;

        Ok(batches)
    }

    /// Total units on hand for a medicine, regardless of expiry.
    pub async fn quantity_on_hand(&self, medicine_id: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(quantity) FROM batches WHERE medicine_id = ?1")
                .bind(medicine_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }

    /// Movement history of a batch, oldest first.
    pub async fn movements_for_batch(&self, batch_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, batch_id, delta, reason, reference, created_at
            FROM stock_movements
            WHERE batch_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    // =========================================================================
    // Receipt
    // =========================================================================

    /// Inserts a received batch and its `receipt` movement atomically.
    ///
    /// ## Returns
    /// * `Ok(Batch)` - The stored batch (version 0)
    /// * `Err(DbError::UniqueViolation)` - Batch number already used for the medicine
    /// * `Err(DbError::ForeignKeyViolation)` - Unknown medicine
    pub async fn receive(&self, new: &NewBatch, reference: Option<&str>) -> DbResult<Batch> {
        let mut tx = self.pool.begin().await?;
        let batch = Self::receive_tx(&mut tx, new, reference).await?;
        tx.commit().await?;

        Ok(batch)
    }

    /// Transactional body of [`BatchRepository::receive`].
    pub async fn receive_tx(
        conn: &mut SqliteConnection,
        new: &NewBatch,
        reference: Option<&str>,
    ) -> DbResult<Batch> {
        let now = Utc::now();
        let batch = Batch {
            id: generate_batch_id(),
            medicine_id: new.medicine_id.clone(),
            batch_number: new.batch_number.trim().to_string(),
            quantity: new.quantity,
            expiry_date: new.expiry_date,
            manufactured_date: new.manufactured_date,
            sale_price_cents: new.sale_price_cents,
            purchase_cost_cents: new.purchase_cost_cents,
            version: 0,
            received_at: now,
            updated_at: now,
        };

        debug!(
            id = %batch.id,
            medicine_id = %batch.medicine_id,
            batch_number = %batch.batch_number,
            quantity = batch.quantity,
            "Receiving batch"
        );

        sqlx::query(
            r#"
            INSERT INTO batches (
                id, medicine_id, batch_number, quantity,
                expiry_date, manufactured_date,
                sale_price_cents, purchase_cost_cents,
                version, received_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.medicine_id)
        .bind(&batch.batch_number)
        .bind(batch.quantity)
        .bind(batch.expiry_date)
        .bind(batch.manufactured_date)
        .bind(batch.sale_price_cents)
        .bind(batch.purchase_cost_cents)
        .bind(batch.version)
        .bind(batch.received_at)
        .bind(batch.updated_at)
        .execute(&mut *conn)
        .await?;

        Self::record_movement_tx(
            &mut *conn,
            &batch.id,
            batch.quantity,
            MovementReason::Receipt,
            reference,
        )
        .await?;

        Ok(batch)
    }

    // =========================================================================
    // Quantity Mutations
    // =========================================================================

    /// Takes `amount` units from a batch read at `expected_version`.
    ///
    /// ## Returns
    /// * `Ok(())` - Decremented, version bumped
    /// * `Err(DbError::StaleVersion)` - The batch moved since it was read,
    ///   or no longer holds `amount` units
    pub async fn decrement_tx(
        conn: &mut SqliteConnection,
        batch_id: &str,
        amount: i64,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(batch_id = %batch_id, amount, expected_version, "Decrementing batch");

        let result = sqlx::query(
            r#"
            UPDATE batches SET
                quantity = quantity - ?2,
                version = version + 1,
                updated_at = ?4
            WHERE id = ?1 AND version = ?3 AND quantity >= ?2
            "#,
        )
        .bind(batch_id)
        .bind(amount)
        .bind(expected_version)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Batch", batch_id));
        }

        Ok(())
    }

    /// Puts `amount` units back into a batch.
    ///
    /// Unconditional apart from existence: a refund restores into whatever
    /// state the batch is in now.
    pub async fn restore_tx(
        conn: &mut SqliteConnection,
        batch_id: &str,
        amount: i64,
    ) -> DbResult<()> {
        debug!(batch_id = %batch_id, amount, "Restoring batch quantity");

        let result = sqlx::query(
            r#"
            UPDATE batches SET
                quantity = quantity + ?2,
                version = version + 1,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(batch_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", batch_id));
        }

        Ok(())
    }

    /// Applies a signed correction to a batch read at `expected_version`.
    ///
    /// The update never lets the quantity drop below zero; a zero-row
    /// result means the version moved or the correction was too large.
    pub async fn adjust_tx(
        conn: &mut SqliteConnection,
        batch_id: &str,
        delta: i64,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(batch_id = %batch_id, delta, expected_version, "Adjusting batch");

        let result = sqlx::query(
            r#"
            UPDATE batches SET
                quantity = quantity + ?2,
                version = version + 1,
                updated_at = ?4
            WHERE id = ?1 AND version = ?3 AND quantity + ?2 >= 0
            "#,
        )
        .bind(batch_id)
        .bind(delta)
        .bind(expected_version)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Batch", batch_id));
        }

        Ok(())
    }

    /// Appends one row to the movement log.
    pub async fn record_movement_tx<'e, E>(
        executor: E,
        batch_id: &str,
        delta: i64,
        reason: MovementReason,
        reference: Option<&str>,
    ) -> DbResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, batch_id, delta, reason, reference, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(batch_id)
        .bind(delta)
        .bind(reason)
        .bind(reference)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(())
    }
}

/// Helper to generate a new batch ID.
pub fn generate_batch_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use medix_core::{MedicineCategory, NewMedicine};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let medicine = db
            .medicines()
            .create(&NewMedicine {
                name: "Paracetamol 500mg".to_string(),
                generic_name: None,
                category: MedicineCategory::Tablet,
                requires_prescription: false,
            })
            .await
            .unwrap();
        (db, medicine.id)
    }

    fn receipt(medicine_id: &str, number: &str, quantity: i64, expiry: NaiveDate) -> NewBatch {
        NewBatch {
            medicine_id: medicine_id.to_string(),
            batch_number: number.to_string(),
            quantity,
            expiry_date: expiry,
            manufactured_date: date(2024, 1, 1),
            sale_price_cents: 150,
            purchase_cost_cents: 90,
        }
    }

    #[tokio::test]
    async fn test_receive_records_movement() {
        let (db, medicine_id) = setup().await;
        let repo = db.batches();

        let batch = repo
            .receive(&receipt(&medicine_id, "B1", 5, date(2025, 1, 1)), Some("PO-1"))
            .await
            .unwrap();

        let stored = repo.get_by_id(&batch.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 5);
        assert_eq!(stored.expiry_date, date(2025, 1, 1));
        assert_eq!(stored.version, 0);

        let movements = repo.movements_for_batch(&batch.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, 5);
        assert_eq!(movements[0].reason, MovementReason::Receipt);
        assert_eq!(movements[0].reference.as_deref(), Some("PO-1"));
    }

    #[tokio::test]
    async fn test_duplicate_batch_number_rejected() {
        let (db, medicine_id) = setup().await;
        let repo = db.batches();

        repo.receive(&receipt(&medicine_id, "B1", 5, date(2025, 1, 1)), None)
            .await
            .unwrap();
        let err = repo
            .receive(&receipt(&medicine_id, "B1", 3, date(2025, 2, 1)), None)
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on("batch_number"));
    }

    #[tokio::test]
    async fn test_available_filters_and_orders() {
        let (db, medicine_id) = setup().await;
        let repo = db.batches();

        repo.receive(&receipt(&medicine_id, "B2", 10, date(2025, 6, 1)), None)
            .await
            .unwrap();
        repo.receive(&receipt(&medicine_id, "B1", 5, date(2025, 1, 1)), None)
            .await
            .unwrap();
        repo.receive(&receipt(&medicine_id, "OLD", 7, date(2024, 6, 1)), None)
            .await
            .unwrap();

        let available = repo
            .available_for_medicine(&medicine_id, date(2024, 12, 1))
            .await
            .unwrap();
        let numbers: Vec<&str> = available.iter().map(|b| b.batch_number.as_str()).collect();
        assert_eq!(numbers, vec!["B1", "B2"]);

        assert_eq!(repo.list_for_medicine(&medicine_id).await.unwrap().len(), 3);
        assert_eq!(repo.quantity_on_hand(&medicine_id).await.unwrap(), 22);
    }

    #[tokio::test]
    async fn test_decrement_guards() {
        let (db, medicine_id) = setup().await;
        let repo = db.batches();
        let batch = repo
            .receive(&receipt(&medicine_id, "B1", 10, date(2025, 1, 1)), None)
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        BatchRepository::decrement_tx(&mut conn, &batch.id, 6, 0).await.unwrap();

        // Same version again: lost the race
        let err = BatchRepository::decrement_tx(&mut conn, &batch.id, 1, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StaleVersion { .. }));

        // Right version, not enough units
        let err = BatchRepository::decrement_tx(&mut conn, &batch.id, 5, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StaleVersion { .. }));

        let stored = BatchRepository::find_tx(&mut *conn, &batch.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 4);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_restore_and_adjust() {
        let (db, medicine_id) = setup().await;
        let repo = db.batches();
        let batch = repo
            .receive(&receipt(&medicine_id, "B1", 3, date(2025, 1, 1)), None)
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        BatchRepository::restore_tx(&mut conn, &batch.id, 2).await.unwrap();

        // 5 on hand now; -6 would go negative
        let err = BatchRepository::adjust_tx(&mut conn, &batch.id, -6, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StaleVersion { .. }));

        BatchRepository::adjust_tx(&mut conn, &batch.id, -5, 1).await.unwrap();
        let stored = BatchRepository::find_tx(&mut *conn, &batch.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 0);
        assert_eq!(stored.version, 2);

        assert!(matches!(
            BatchRepository::restore_tx(&mut conn, "missing", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
