//! # Settlement Error Types
//!
//! Every checkout, refund and stock operation fails with a [`SettlementError`].
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Settlement Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Request      │  │    Business     │  │     Concurrency         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidInput   │  │  Insufficient-  │  │  ConcurrencyConflict    │ │
//! │  │  Config         │  │   Stock         │  │  TransientFailure       │ │
//! │  │                 │  │  MedicineNot-   │  │                         │ │
//! │  │                 │  │   Found/Inactive│  │                         │ │
//! │  │                 │  │  SaleNotFound   │  │                         │ │
//! │  │                 │  │  InvalidSale-   │  │                         │ │
//! │  │                 │  │   Status        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Persistence(DbError) ← anything else the store reports                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `ConcurrencyConflict` never reaches a caller directly: the retry loop
//! either absorbs it or reports `TransientFailure` once attempts run out.

use medix_core::{CoreError, SaleStatus, ValidationError};
use medix_db::DbError;
use thiserror::Error;

/// Result type alias for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Settlement error type covering all possible checkout / refund failures.
#[derive(Debug, Error)]
pub enum SettlementError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// The request failed validation before touching the store.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Business Errors
    // =========================================================================
    /// Eligible stock does not cover a requested quantity.
    ///
    /// ## When This Occurs
    /// - Every unexpired batch together holds fewer units than requested
    /// - A concurrent checkout took the stock between two attempts
    #[error("Insufficient stock for {medicine_name}: available {available}, requested {requested}")]
    InsufficientStock {
        medicine_id: String,
        medicine_name: String,
        available: i64,
        requested: i64,
    },

    /// A checkout line names a medicine the catalog doesn't know.
    #[error("Medicine not found: {medicine_id}")]
    MedicineNotFound { medicine_id: String },

    /// A checkout line names a deactivated medicine.
    #[error("Medicine {name} ({medicine_id}) is no longer sold")]
    MedicineInactive { medicine_id: String, name: String },

    /// A stock operation names a batch that doesn't exist.
    #[error("Batch not found: {batch_id}")]
    BatchNotFound { batch_id: String },

    /// No sale carries the invoice number.
    #[error("Sale not found: {invoice_number}")]
    SaleNotFound { invoice_number: String },

    /// The sale's status forbids the operation (a fully refunded sale).
    #[error("Sale {invoice_number} is {status}, cannot refund")]
    InvalidSaleStatus {
        invoice_number: String,
        status: SaleStatus,
    },

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    /// A single attempt lost a race: the store was busy or a guarded row
    /// changed underneath it. Retried internally.
    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    /// Retries exhausted without a conflict-free attempt.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    TransientFailure { attempts: u32, last_error: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Any other store failure. The transaction was rolled back.
    #[error("Persistence error: {0}")]
    Persistence(DbError),
}

// =============================================================================
// Error Conversions
// =============================================================================

/// Contention is split off so the retry loop can recognise it.
impl From<DbError> for SettlementError {
    fn from(err: DbError) -> Self {
        if err.is_contention() {
            SettlementError::ConcurrencyConflict(err.to_string())
        } else {
            SettlementError::Persistence(err)
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for SettlementError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                medicine_id,
                available,
                requested,
            } => SettlementError::InsufficientStock {
                medicine_name: medicine_id.clone(),
                medicine_id,
                available,
                requested,
            },
            CoreError::InvalidSaleStatus {
                invoice_number,
                current_status,
            } => SettlementError::InvalidSaleStatus {
                invoice_number,
                status: match current_status.as_str() {
                    "completed" => SaleStatus::Completed,
                    "partially-refunded" => SaleStatus::PartiallyRefunded,
                    _ => SaleStatus::Refunded,
                },
            },
            CoreError::Validation(v) => SettlementError::InvalidInput(v),
        }
    }
}

impl From<std::io::Error> for SettlementError {
    fn from(err: std::io::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SettlementError {
    fn from(err: toml::de::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SettlementError {
    fn from(err: toml::ser::Error) -> Self {
        SettlementError::Config(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SettlementError {
    /// Returns true if a single attempt lost a race and may be run again
    /// inside the same operation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SettlementError::ConcurrencyConflict(_))
    }

    /// Returns true if the caller may resubmit the same request later.
    ///
    /// ## Retryable Errors
    /// - Lost races and exhausted retries
    /// - Store failures (the transaction was rolled back)
    ///
    /// ## Non-Retryable Errors
    /// - Validation, catalog and stock shortfalls
    /// - Configuration errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::ConcurrencyConflict(_)
                | SettlementError::TransientFailure { .. }
                | SettlementError::Persistence(_)
        )
    }

    /// Returns true if the caller sent a request that can never succeed as-is.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SettlementError::InvalidInput(_)
                | SettlementError::InsufficientStock { .. }
                | SettlementError::MedicineNotFound { .. }
                | SettlementError::MedicineInactive { .. }
                | SettlementError::BatchNotFound { .. }
                | SettlementError::SaleNotFound { .. }
                | SettlementError::InvalidSaleStatus { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, SettlementError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_contention_becomes_conflict() {
        let busy: SettlementError = DbError::Busy("database is locked".into()).into();
        assert!(busy.is_conflict());

        let stale: SettlementError = DbError::stale("Batch", "b-1").into();
        assert!(stale.is_conflict());

        let missing: SettlementError = DbError::not_found("Sale", "INV-1").into();
        assert!(!missing.is_conflict());
        assert!(missing.is_retryable());
        assert!(matches!(missing, SettlementError::Persistence(_)));
    }

    #[test]
    fn test_core_errors_map_across() {
        let err: SettlementError = CoreError::InsufficientStock {
            medicine_id: "med-1".into(),
            available: 5,
            requested: 8,
        }
        .into();
        assert!(matches!(
            err,
            SettlementError::InsufficientStock { available: 5, requested: 8, .. }
        ));
        assert!(err.is_client_error());
        assert!(!err.is_retryable());

        let err: SettlementError = CoreError::Validation(ValidationError::MustBePositive {
            field: "quantity".into(),
        })
        .into();
        assert!(matches!(err, SettlementError::InvalidInput(_)));
    }

    #[test]
    fn test_error_classes_do_not_overlap() {
        let config = SettlementError::Config("bad prefix".into());
        assert!(config.is_config_error());
        assert!(!config.is_client_error());
        assert!(!config.is_retryable());

        let rejected = SettlementError::MedicineNotFound {
            medicine_id: "med-9".into(),
        };
        assert!(rejected.is_client_error());
        assert!(!rejected.is_config_error());

        let stored: SettlementError = DbError::QueryFailed("disk I/O error".into()).into();
        assert!(stored.is_retryable());
        assert!(!stored.is_client_error());
        assert!(!stored.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SettlementError::InvalidSaleStatus {
            invoice_number: "INV-250101-0000ABCD".into(),
            status: SaleStatus::Refunded,
        };
        assert!(err.to_string().contains("INV-250101-0000ABCD"));
        assert!(err.to_string().contains("refunded"));

        let err = SettlementError::TransientFailure {
            attempts: 5,
            last_error: "database is locked".into(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_conflict());
        assert!(err.to_string().contains('5'));
    }
}
