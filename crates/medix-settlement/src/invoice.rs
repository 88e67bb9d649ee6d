//! # Invoice Numbers
//!
//! Invoice numbers are human-facing, printed on receipts and typed back in
//! at the refund counter:
//!
//! ```text
//! INV-250101-7F3A9C21
//! ─┬─ ───┬── ────┬───
//!  │     │       └── 8 random hex digits
//!  │     └────────── sale date (YYMMDD)
//!  └──────────────── configurable prefix
//! ```
//!
//! Uniqueness is enforced by the store, not the generator: a collision
//! fails the insert and checkout asks for another number.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Produces candidate invoice numbers.
pub trait InvoiceNumberGenerator: Send + Sync {
    fn generate(&self, now: DateTime<Utc>) -> String;
}

/// `{prefix}-{YYMMDD}-{8 hex}` with the hex part drawn from a v4 UUID.
#[derive(Debug, Clone)]
pub struct RandomInvoiceNumbers {
    prefix: String,
}

impl RandomInvoiceNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        RandomInvoiceNumbers {
            prefix: prefix.into(),
        }
    }
}

impl Default for RandomInvoiceNumbers {
    fn default() -> Self {
        Self::new("INV")
    }
}

impl InvoiceNumberGenerator for RandomInvoiceNumbers {
    fn generate(&self, now: DateTime<Utc>) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            self.prefix,
            now.format("%y%m%d"),
            random[..8].to_ascii_uppercase()
        )
    }
}
