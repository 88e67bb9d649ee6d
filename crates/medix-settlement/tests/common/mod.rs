//! Shared fixtures for the settlement integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use medix_core::{Batch, Medicine, MedicineCategory, NewBatch, NewMedicine};
use medix_db::{Database, DbConfig};
use medix_settlement::{FixedClock, InvoiceNumberGenerator, RetryPolicy, SettlementEngine};

/// Every test runs on 1 December 2024.
pub fn today() -> NaiveDate {
    date(2024, 12, 1)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Engine over a private in-memory database.
pub async fn memory_engine() -> SettlementEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    engine(db)
}

/// Engine over a file database with a real connection pool, for tests that
/// need several transactions in flight at once.
pub async fn file_engine(dir: &Path, max_connections: u32) -> SettlementEngine {
    let config = DbConfig::new(dir.join("medix-test.db"))
        .max_connections(max_connections)
        .busy_timeout(Duration::from_secs(10));
    let db = Database::new(config).await.unwrap();

    engine(db).with_retry_policy(RetryPolicy {
        max_attempts: 50,
        initial_backoff: Duration::from_millis(2),
        max_backoff: Duration::from_millis(50),
    })
}

fn engine(db: Database) -> SettlementEngine {
    SettlementEngine::new(db)
        .with_clock(FixedClock::on(today()))
        .with_retry_policy(RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
        })
}

pub async fn add_medicine(engine: &SettlementEngine, name: &str) -> Medicine {
    engine
        .database()
        .medicines()
        .create(&NewMedicine {
            name: name.to_string(),
            generic_name: None,
            category: MedicineCategory::Tablet,
            requires_prescription: false,
        })
        .await
        .unwrap()
}

pub async fn add_batch(
    engine: &SettlementEngine,
    medicine: &Medicine,
    batch_number: &str,
    quantity: i64,
    expiry_date: NaiveDate,
    sale_price_cents: i64,
) -> Batch {
    engine
        .receive_batch(
            &NewBatch {
                medicine_id: medicine.id.clone(),
                batch_number: batch_number.to_string(),
                quantity,
                expiry_date,
                manufactured_date: date(2024, 1, 1),
                sale_price_cents,
                purchase_cost_cents: sale_price_cents * 6 / 10,
            },
            Some("test receipt"),
        )
        .await
        .unwrap()
}

pub async fn quantity(engine: &SettlementEngine, batch: &Batch) -> i64 {
    engine
        .database()
        .batches()
        .get_by_id(&batch.id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

pub async fn sale_count(engine: &SettlementEngine) -> i64 {
    engine.database().sales().count().await.unwrap()
}

/// Hands out a scripted list of invoice numbers, repeating the last one.
pub struct ScriptedInvoices {
    numbers: Mutex<VecDeque<String>>,
}

impl ScriptedInvoices {
    pub fn new(numbers: &[&str]) -> Self {
        ScriptedInvoices {
            numbers: Mutex::new(numbers.iter().map(|n| n.to_string()).collect()),
        }
    }
}

impl InvoiceNumberGenerator for ScriptedInvoices {
    fn generate(&self, _now: DateTime<Utc>) -> String {
        let mut numbers = self.numbers.lock().unwrap();
        if numbers.len() > 1 {
            numbers.pop_front().unwrap()
        } else {
            numbers.front().cloned().unwrap()
        }
    }
}
