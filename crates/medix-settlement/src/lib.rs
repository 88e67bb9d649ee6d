//! # medix-settlement: Sale Settlement Coordinator for Medix
//!
//! Turns a cart into a committed sale and a committed sale back into
//! stock, without ever overselling a batch.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Medix Architecture                               │
//! │                                                                         │
//! │   till UI / `medix` CLI                                                │
//! │        │  CheckoutRequest / RefundRequest (JSON)                       │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              ★ medix-settlement (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌─────────┐  │   │
//! │  │   │  checkout  │  │   refund   │  │   stock    │  │  retry  │  │   │
//! │  │   └─────┬──────┘  └─────┬──────┘  └─────┬──────┘  └─────────┘  │   │
//! │  │         └───────────────┼───────────────┘                      │   │
//! │  │                   SettlementEngine                              │   │
//! │  │          (Database, Clock, InvoiceNumberGenerator)              │   │
//! │  └─────────────────────────┬───────────────────────────────────────┘   │
//! │                            │                                            │
//! │          ┌─────────────────┴─────────────────┐                          │
//! │          ▼                                   ▼                          │
//! │   medix-core (FEFO, pricing)          medix-db (SQLite)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Each checkout / refund attempt is one SQLite transaction. Batch updates
//! are guarded by `version` and `quantity >= amount`; a zero-row update or
//! a busy database rolls the attempt back and [`retry::RetryPolicy`] runs
//! it again from a fresh read. Two tills can never sell the same unit.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medix_settlement::{CheckoutRequest, SettlementConfig, SettlementEngine};
//! use medix_core::PaymentMethod;
//!
//! let config = SettlementConfig::load(None)?;
//! let engine = SettlementEngine::from_config(&config).await?;
//!
//! let request = CheckoutRequest::new("staff-7", PaymentMethod::Cash).line(&medicine_id, 8);
//! let sale = engine.checkout(&request).await?;
//! println!("{} {}", sale.sale.invoice_number, sale.sale.total());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod invoice;
pub mod refund;
pub mod retry;
pub mod stock;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutRequest, CustomerInfo, LineRequest};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CheckoutSettings, DatabaseSettings, SettlementConfig};
pub use engine::SettlementEngine;
pub use error::{SettlementError, SettlementResult};
pub use invoice::{InvoiceNumberGenerator, RandomInvoiceNumbers};
pub use refund::{RefundLineRequest, RefundRequest, RestockPolicy};
pub use retry::RetryPolicy;
pub use stock::StockLevel;
