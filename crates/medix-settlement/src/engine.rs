//! # Settlement Engine
//!
//! The handle callers hold. Checkout, refund and stock operations are
//! implemented in their own modules as `impl SettlementEngine` blocks.
//!
//! ## Collaborators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SettlementEngine                                   │
//! │                                                                         │
//! │   Database ────────────── catalog, batch ledger, sale records          │
//! │   Arc<dyn Clock> ──────── "today" for expiry, timestamps               │
//! │   Arc<dyn InvoiceNumberGenerator> ── candidate invoice numbers         │
//! │   RetryPolicy ─────────── attempts / backoff on conflicts              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cloning is cheap and every clone shares the pool, so one engine can be
//! handed to many concurrent tasks.

use std::sync::Arc;

use medix_core::SaleRecord;
use medix_db::Database;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::SettlementConfig;
use crate::error::{SettlementError, SettlementResult};
use crate::invoice::{InvoiceNumberGenerator, RandomInvoiceNumbers};
use crate::retry::RetryPolicy;

/// Coordinates checkouts, refunds and stock mutations against one store.
#[derive(Clone)]
pub struct SettlementEngine {
    pub(crate) db: Database,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) invoices: Arc<dyn InvoiceNumberGenerator>,
    pub(crate) retry: RetryPolicy,
    pub(crate) max_invoice_attempts: u32,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("db", &self.db)
            .field("retry", &self.retry)
            .field("max_invoice_attempts", &self.max_invoice_attempts)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    /// Creates an engine with the wall clock, random invoice numbers and
    /// the default retry policy.
    pub fn new(db: Database) -> Self {
        SettlementEngine {
            db,
            clock: Arc::new(SystemClock),
            invoices: Arc::new(RandomInvoiceNumbers::default()),
            retry: RetryPolicy::default(),
            max_invoice_attempts: 5,
        }
    }

    /// Opens the configured database and builds an engine around it.
    pub async fn from_config(config: &SettlementConfig) -> SettlementResult<Self> {
        let db = Database::new(config.db_config()).await?;

        info!(
            path = %config.database.path.display(),
            max_attempts = config.checkout.max_attempts,
            "Settlement engine ready"
        );

        Ok(Self::with_database(db, config))
    }

    /// Builds an engine around an already opened database.
    pub fn with_database(db: Database, config: &SettlementConfig) -> Self {
        Self::new(db)
            .with_invoice_generator(RandomInvoiceNumbers::new(&config.checkout.invoice_prefix))
            .with_retry_policy(config.retry_policy())
            .with_max_invoice_attempts(config.checkout.max_invoice_attempts)
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_invoice_generator(
        mut self,
        generator: impl InvoiceNumberGenerator + 'static,
    ) -> Self {
        self.invoices = Arc::new(generator);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_max_invoice_attempts(mut self, attempts: u32) -> Self {
        self.max_invoice_attempts = attempts.max(1);
        self
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Reads a sale with its lines and refund history.
    ///
    /// ## Returns
    /// * `Err(SettlementError::SaleNotFound)` - No sale has this invoice number
    pub async fn sale(&self, invoice_number: &str) -> SettlementResult<SaleRecord> {
        self.db
            .sales()
            .get_by_invoice(invoice_number.trim())
            .await?
            .ok_or_else(|| SettlementError::SaleNotFound {
                invoice_number: invoice_number.trim().to_string(),
            })
    }
}
