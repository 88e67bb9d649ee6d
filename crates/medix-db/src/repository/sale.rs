//! # Sale Record Repository
//!
//! Database operations for sales, their lines and their refunds.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. APPEND (checkout transaction)                                      │
//! │     └── insert_sale_tx() → Sale { status: completed }                  │
//! │     └── insert_lines_tx() → SaleLine × n  (immutable from here on)     │
//! │                                                                         │
//! │  2. REFUND (refund transaction, repeatable)                            │
//! │     └── insert_refunds_tx() → RefundLine × n                           │
//! │     └── update_after_refund_tx() → totals recomputed, version + 1      │
//! │            status: partially-refunded | refunded                       │
//! │                                                                         │
//! │  3. READ                                                               │
//! │     └── get_by_invoice() → SaleRecord { sale, lines, refunds }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medix_core::{RefundLine, Sale, SaleLine, SaleRecord, SaleStatus};

const SALE_COLUMNS: &str = r#"
    id,
    invoice_number,
    customer_name,
    customer_mobile,
    status,
    subtotal_cents,
    discount_bps,
    discount_cents,
    vat_bps,
    vat_cents,
    total_cents,
    refunded_cents,
    payment_method,
    staff_id,
    created_at,
    updated_at,
    version
"#;

/// Header totals written back after a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundedTotals {
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,
    pub refunded_cents: i64,
}

/// Repository for sale record operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale with its lines and refunds by invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<SaleRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::record_tx(&mut conn, invoice_number).await
    }

    /// Reads a full sale record on a caller-supplied connection.
    pub async fn record_tx(
        conn: &mut SqliteConnection,
        invoice_number: &str,
    ) -> DbResult<Option<SaleRecord>> {
        let Some(sale) = Self::find_by_invoice_tx(&mut *conn, invoice_number).await? else {
            return Ok(None);
        };

        let lines = Self::lines_tx(&mut *conn, &sale.id).await?;
        let refunds = Self::refunds_tx(&mut *conn, &sale.id).await?;

        Ok(Some(SaleRecord {
            sale,
            lines,
            refunds,
        }))
    }

    /// Reads a sale header by invoice number.
    pub async fn find_by_invoice_tx<'e, E>(
        executor: E,
        invoice_number: &str,
    ) -> DbResult<Option<Sale>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE invoice_number = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(invoice_number)
            .fetch_optional(executor)
            .await?;

        Ok(sale)
    }

    /// Reads the lines of a sale in display order.
    pub async fn lines_tx<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<SaleLine>>
    where
        E: SqliteExecutor<'e>,
    {
        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT
                id, sale_id, line_no, medicine_id, batch_id,
                medicine_name, batch_number, quantity,
                unit_price_cents, subtotal_cents, created_at
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(executor)
        .await?;

        Ok(lines)
    }

    /// Reads the refund history of a sale, oldest first.
    pub async fn refunds_tx<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<RefundLine>>
    where
        E: SqliteExecutor<'e>,
    {
        let refunds = sqlx::query_as::<_, RefundLine>(
            r#"
            SELECT
                id, sale_id, sale_line_id, quantity, restocked,
                staff_id, reason, created_at
            FROM refund_lines
            WHERE sale_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(executor)
        .await?;

        Ok(refunds)
    }

    /// Counts committed sales (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a sale header.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` on `sales.invoice_number` when the
    ///   invoice number is already taken. Nothing is overwritten.
    pub async fn insert_sale_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, invoice_number = %sale.invoice_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, customer_name, customer_mobile, status,
                subtotal_cents, discount_bps, discount_cents, vat_bps, vat_cents,
                total_cents, refunded_cents, payment_method, staff_id,
                created_at, updated_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(&sale.customer_name)
        .bind(&sale.customer_mobile)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_bps)
        .bind(sale.discount_cents)
        .bind(sale.vat_bps)
        .bind(sale.vat_cents)
        .bind(sale.total_cents)
        .bind(sale.refunded_cents)
        .bind(sale.payment_method)
        .bind(&sale.staff_id)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts the lines of a sale.
    ///
    /// ## Snapshot Pattern
    /// Medicine name, batch number and unit price are copied into the line
    /// so the record survives later catalog and price changes.
    pub async fn insert_lines_tx(conn: &mut SqliteConnection, lines: &[SaleLine]) -> DbResult<()> {
        for line in lines {
            debug!(
                sale_id = %line.sale_id,
                line_no = line.line_no,
                batch_id = %line.batch_id,
                "Inserting sale line"
            );

            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    id, sale_id, line_no, medicine_id, batch_id,
                    medicine_name, batch_number, quantity,
                    unit_price_cents, subtotal_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&line.id)
            .bind(&line.sale_id)
            .bind(line.line_no)
            .bind(&line.medicine_id)
            .bind(&line.batch_id)
            .bind(&line.medicine_name)
            .bind(&line.batch_number)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.subtotal_cents)
            .bind(line.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Appends refund lines.
    pub async fn insert_refunds_tx(
        conn: &mut SqliteConnection,
        refunds: &[RefundLine],
    ) -> DbResult<()> {
        for refund in refunds {
            sqlx::query(
                r#"
                INSERT INTO refund_lines (
                    id, sale_id, sale_line_id, quantity, restocked,
                    staff_id, reason, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&refund.id)
            .bind(&refund.sale_id)
            .bind(&refund.sale_line_id)
            .bind(refund.quantity)
            .bind(refund.restocked)
            .bind(&refund.staff_id)
            .bind(&refund.reason)
            .bind(refund.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Writes recomputed header totals and the new status, guarded by the
    /// version the sale was read at.
    ///
    /// ## Returns
    /// * `Err(DbError::StaleVersion)` - Another refund committed first
    pub async fn update_after_refund_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        expected_version: i64,
        totals: &RefundedTotals,
    ) -> DbResult<()> {
        debug!(sale_id = %sale_id, status = %totals.status, "Updating sale after refund");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = ?3,
                subtotal_cents = ?4,
                discount_cents = ?5,
                vat_cents = ?6,
                total_cents = ?7,
                refunded_cents = ?8,
                updated_at = ?9,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(sale_id)
        .bind(expected_version)
        .bind(totals.status)
        .bind(totals.subtotal_cents)
        .bind(totals.discount_cents)
        .bind(totals.vat_cents)
        .bind(totals.total_cents)
        .bind(totals.refunded_cents)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Sale", sale_id));
        }

        Ok(())
    }
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale line ID.
pub fn generate_sale_line_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new refund line ID.
pub fn generate_refund_line_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
