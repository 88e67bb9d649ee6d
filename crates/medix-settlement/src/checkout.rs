//! # Checkout
//!
//! Turns a cart into a committed sale.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Attempt                                │
//! │                                                                         │
//! │  CheckoutRequest ── validate() ──► DiscountRate                        │
//! │       │                                                                 │
//! │       ▼  BEGIN                                                          │
//! │  1. catalog: every medicine exists and is active                       │
//! │  2. ledger: eligible batches → StockSnapshot → FEFO per line           │
//! │       │        InsufficientStock ──► ROLLBACK, nothing written         │
//! │       ▼                                                                 │
//! │  3. price allocated lines (discount, 13% VAT, round once)              │
//! │  4. insert sale header under a fresh invoice number                    │
//! │       │        invoice taken ──► draw another number, same tx          │
//! │       ▼                                                                 │
//! │  5. decrement batches in ascending id order (version-guarded)          │
//! │     append `sale` movements, insert sale lines                         │
//! │       │        busy / stale ──► ROLLBACK, back off, new attempt        │
//! │       ▼  COMMIT                                                         │
//! │  SaleRecord { sale, lines, refunds: [] }                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use medix_core::validation::{
    validate_customer_name, validate_line_count, validate_mobile, validate_quantity,
    validate_staff_id, ValidationResult,
};
use medix_core::{
    price_lines, Allocation, CoreError, DiscountRate, LineAmount, Medicine, Money, MovementReason,
    PaymentMethod, Sale, SaleLine, SaleRecord, SaleStatus, StockSnapshot, ValidationError,
    VAT_RATE,
};
use medix_db::repository::sale::{generate_sale_id, generate_sale_line_id};
use medix_db::{BatchRepository, DbError, MedicineRepository, SaleRepository};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::engine::SettlementEngine;
use crate::error::{SettlementError, SettlementResult};

// =============================================================================
// Request DTOs
// =============================================================================

/// Optional walk-in customer details printed on the receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

/// One cart line: a medicine and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub medicine_id: String,
    pub quantity: i64,
}

/// A complete checkout request. The cart lives here, not in the engine.
///
/// ## JSON Shape
/// ```json
/// {
///   "customer": { "name": "A. Khan", "mobile": "+92 300 1234567" },
///   "lines": [{ "medicine_id": "…", "quantity": 8 }],
///   "discount_pct": "10",
///   "payment_method": "cash",
///   "staff_id": "staff-7"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer: CustomerInfo,
    pub lines: Vec<LineRequest>,
    /// Whole-sale discount in percent, 0 to 100 with up to two decimals.
    #[serde(default)]
    #[ts(type = "string")]
    pub discount_pct: Decimal,
    pub payment_method: PaymentMethod,
    pub staff_id: String,
}

impl CheckoutRequest {
    /// Starts an empty cart with no discount.
    pub fn new(staff_id: impl Into<String>, payment_method: PaymentMethod) -> Self {
        CheckoutRequest {
            customer: CustomerInfo::default(),
            lines: Vec::new(),
            discount_pct: Decimal::ZERO,
            payment_method,
            staff_id: staff_id.into(),
        }
    }

    pub fn line(mut self, medicine_id: impl Into<String>, quantity: i64) -> Self {
        self.lines.push(LineRequest {
            medicine_id: medicine_id.into(),
            quantity,
        });
        self
    }

    pub fn discount(mut self, pct: Decimal) -> Self {
        self.discount_pct = pct;
        self
    }

    pub fn customer(mut self, name: Option<&str>, mobile: Option<&str>) -> Self {
        self.customer = CustomerInfo {
            name: name.map(str::to_string),
            mobile: mobile.map(str::to_string),
        };
        self
    }

    /// Checks everything that can be checked without the store.
    ///
    /// ## Rules
    /// - 1 to 100 lines, each quantity 1 to 999
    /// - Discount 0 to 100 percent, at most two decimals
    /// - Staff id present, customer name / mobile well-formed
    pub fn validate(&self) -> ValidationResult<DiscountRate> {
        validate_staff_id(&self.staff_id)?;
        validate_customer_name(self.customer.name.as_deref())?;
        validate_mobile(self.customer.mobile.as_deref())?;
        validate_line_count("lines", self.lines.len())?;

        for line in &self.lines {
            if line.medicine_id.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "medicine_id".to_string(),
                });
            }
            validate_quantity(line.quantity)?;
        }

        DiscountRate::from_percentage(self.discount_pct)
    }
}

// =============================================================================
// Checkout
// =============================================================================

impl SettlementEngine {
    /// Settles a cart: allocates stock FEFO, prices it and records the sale,
    /// all or nothing.
    ///
    /// ## Returns
    /// * `Ok(SaleRecord)` - The committed sale and its lines
    /// * `Err(InvalidInput)` - The request failed validation
    /// * `Err(MedicineNotFound | MedicineInactive)` - Catalog rejected a line
    /// * `Err(InsufficientStock)` - A line can't be covered; nothing changed
    /// * `Err(TransientFailure)` - Every attempt lost a race
    pub async fn checkout(&self, request: &CheckoutRequest) -> SettlementResult<SaleRecord> {
        let discount = request.validate()?;

        let record = self
            .retry
            .run("checkout", |attempt| self.checkout_attempt(request, discount, attempt))
            .await?;

        info!(
            invoice = %record.sale.invoice_number,
            lines = record.lines.len(),
            total = %record.sale.total(),
            staff_id = %record.sale.staff_id,
            "Sale completed"
        );

        Ok(record)
    }

    /// One transactional attempt. Dropping `tx` on any error rolls back.
    async fn checkout_attempt(
        &self,
        request: &CheckoutRequest,
        discount: DiscountRate,
        attempt: u32,
    ) -> SettlementResult<SaleRecord> {
        let now = self.clock.now();
        let today = self.clock.today();
        debug!(attempt, lines = request.lines.len(), %today, "Checkout attempt");

        let mut tx = self.db.pool().begin().await?;

        // Catalog checks and one snapshot of eligible stock per medicine
        let mut medicines: HashMap<String, Medicine> = HashMap::new();
        let mut versions: HashMap<String, i64> = HashMap::new();
        let mut snapshot = StockSnapshot::new(today);

        for line in &request.lines {
            if medicines.contains_key(&line.medicine_id) {
                continue;
            }

            let medicine = MedicineRepository::find_tx(&mut *tx, &line.medicine_id)
                .await?
                .ok_or_else(|| SettlementError::MedicineNotFound {
                    medicine_id: line.medicine_id.clone(),
                })?;

            if !medicine.is_active {
                return Err(SettlementError::MedicineInactive {
                    medicine_id: medicine.id,
                    name: medicine.name,
                });
            }

            let batches = BatchRepository::available_tx(&mut *tx, &medicine.id, today).await?;
            versions.extend(batches.iter().map(|b| (b.id.clone(), b.version)));
            snapshot.insert(line.medicine_id.clone(), batches);
            medicines.insert(line.medicine_id.clone(), medicine);
        }

        // FEFO, line by line, against the shared snapshot
        let mut allocated: Vec<(&Medicine, Allocation)> = Vec::new();
        for line in &request.lines {
            let medicine = medicines.get(&line.medicine_id).ok_or_else(|| {
                SettlementError::MedicineNotFound {
                    medicine_id: line.medicine_id.clone(),
                }
            })?;

            let allocations = snapshot
                .allocate(&line.medicine_id, line.quantity)
                .map_err(|e| named_shortfall(e, medicine))?;

            allocated.extend(allocations.into_iter().map(|a| (medicine, a)));
        }

        let amounts: Vec<LineAmount> = allocated
            .iter()
            .map(|(_, a)| LineAmount::new(a.quantity, Money::from_cents(a.unit_price_cents)))
            .collect();
        let subtotals: Vec<Money> = amounts
            .iter()
            .map(LineAmount::subtotal)
            .collect::<ValidationResult<_>>()?;
        let totals = price_lines(&amounts, discount, VAT_RATE)?.settle();

        let mut sale = Sale {
            id: generate_sale_id(),
            invoice_number: String::new(),
            customer_name: non_blank(request.customer.name.as_deref()),
            customer_mobile: non_blank(request.customer.mobile.as_deref()),
            status: SaleStatus::Completed,
            subtotal_cents: totals.subtotal.cents(),
            discount_bps: discount.bps(),
            discount_cents: totals.discount.cents(),
            vat_bps: VAT_RATE.bps(),
            vat_cents: totals.vat.cents(),
            total_cents: totals.total.cents(),
            refunded_cents: 0,
            payment_method: request.payment_method,
            staff_id: request.staff_id.trim().to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.insert_under_fresh_invoice(&mut *tx, &mut sale).await?;

        // Ascending batch id; one guarded update per batch even when two
        // cart lines drew from it
        let mut per_batch: BTreeMap<&str, i64> = BTreeMap::new();
        for (_, allocation) in &allocated {
            *per_batch.entry(allocation.batch_id.as_str()).or_insert(0) += allocation.quantity;
        }

        for (batch_id, amount) in &per_batch {
            let version = versions
                .get(*batch_id)
                .copied()
                .ok_or_else(|| DbError::not_found("Batch", *batch_id))?;

            BatchRepository::decrement_tx(&mut *tx, batch_id, *amount, version).await?;
            BatchRepository::record_movement_tx(
                &mut *tx,
                batch_id,
                -amount,
                MovementReason::Sale,
                Some(&sale.invoice_number),
            )
            .await?;
        }

        let lines: Vec<SaleLine> = allocated
            .iter()
            .zip(&subtotals)
            .enumerate()
            .map(|(line_no, ((medicine, allocation), subtotal))| SaleLine {
                id: generate_sale_line_id(),
                sale_id: sale.id.clone(),
                line_no: line_no as i64,
                medicine_id: allocation.medicine_id.clone(),
                batch_id: allocation.batch_id.clone(),
                medicine_name: medicine.name.clone(),
                batch_number: allocation.batch_number.clone(),
                quantity: allocation.quantity,
                unit_price_cents: allocation.unit_price_cents,
                subtotal_cents: subtotal.cents(),
                created_at: now,
            })
            .collect();
        SaleRepository::insert_lines_tx(&mut *tx, &lines).await?;

        tx.commit().await?;

        Ok(SaleRecord {
            sale,
            lines,
            refunds: Vec::new(),
        })
    }

    /// Inserts the header, drawing a new invoice number each time the
    /// store reports the current one as taken.
    async fn insert_under_fresh_invoice(
        &self,
        conn: &mut SqliteConnection,
        sale: &mut Sale,
    ) -> SettlementResult<()> {
        let mut tries = 0;

        loop {
            tries += 1;
            sale.invoice_number = self.invoices.generate(sale.created_at);

            match SaleRepository::insert_sale_tx(&mut *conn, sale).await {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.is_unique_violation_on("invoice_number")
                        && tries < self.max_invoice_attempts =>
                {
                    warn!(
                        invoice = %sale.invoice_number,
                        tries,
                        "Invoice number already used, drawing another"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Attaches the catalog name to a stock shortfall.
fn named_shortfall(err: CoreError, medicine: &Medicine) -> SettlementError {
    match SettlementError::from(err) {
        SettlementError::InsufficientStock {
            medicine_id,
            available,
            requested,
            ..
        } => SettlementError::InsufficientStock {
            medicine_id,
            medicine_name: medicine.name.clone(),
            available,
            requested,
        },
        other => other,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest::new("staff-1", PaymentMethod::Cash).line("med-1", 2)
    }

    #[test]
    fn test_validate_accepts_minimal_request() {
        let rate = request().validate().unwrap();
        assert_eq!(rate.bps(), 0);
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let empty = CheckoutRequest::new("staff-1", PaymentMethod::Cash);
        assert!(matches!(empty.validate(), Err(ValidationError::Empty { .. })));

        let zero = CheckoutRequest::new("staff-1", PaymentMethod::Cash).line("med-1", 0);
        assert!(matches!(zero.validate(), Err(ValidationError::MustBePositive { .. })));

        let too_many = CheckoutRequest::new("staff-1", PaymentMethod::Cash).line("med-1", 1000);
        assert!(matches!(too_many.validate(), Err(ValidationError::OutOfRange { .. })));

        let no_staff = CheckoutRequest::new("  ", PaymentMethod::Cash).line("med-1", 1);
        assert!(no_staff.validate().is_err());

        let discount = request().discount(Decimal::new(1005, 1));
        assert!(discount.validate().is_err());

        let blank_medicine = CheckoutRequest::new("staff-1", PaymentMethod::Card).line("", 1);
        assert!(matches!(
            blank_medicine.validate(),
            Err(ValidationError::Required { .. })
        ));

        let mobile = request().customer(Some("Ayesha"), Some("call me"));
        assert!(mobile.validate().is_err());
    }

    #[test]
    fn test_validate_cart_limit() {
        let mut cart = CheckoutRequest::new("staff-1", PaymentMethod::Cash);
        for i in 0..101 {
            cart = cart.line(format!("med-{i}"), 1);
        }
        assert!(matches!(cart.validate(), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "lines": [{ "medicine_id": "med-1", "quantity": 3 }],
            "discount_pct": "12.5",
            "payment_method": "mobile_wallet",
            "staff_id": "staff-7"
        }"#;

        let request: CheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.customer, CustomerInfo::default());
        assert_eq!(request.payment_method, PaymentMethod::MobileWallet);
        assert_eq!(request.validate().unwrap().bps(), 1250);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Ayesha ")), Some("Ayesha".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
