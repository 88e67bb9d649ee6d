//! # Repository Module
//!
//! Database repository implementations for Medix.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Settlement coordinator                                                │
//! │       │                                                                 │
//! │       │  let mut tx = db.pool().begin().await?;                        │
//! │       │  BatchRepository::available_tx(&mut *tx, id, today)            │
//! │       │  BatchRepository::decrement_tx(&mut tx, id, qty, version)      │
//! │       │  SaleRepository::insert_sale_tx(&mut tx, &sale)                │
//! │       │  tx.commit()                                                   │
//! │       ▼                                                                 │
//! │  Repositories                                                          │
//! │  ├── pool-level methods (&self): one statement or own transaction      │
//! │  └── `_tx` functions: join the caller's transaction                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`MedicineRepository`](medicine::MedicineRepository) - Catalog lookups
//! - [`BatchRepository`](batch::BatchRepository) - Batch ledger and stock movements
//! - [`SaleRepository`](sale::SaleRepository) - Sale records and refunds

pub mod batch;
pub mod medicine;
pub mod sale;
