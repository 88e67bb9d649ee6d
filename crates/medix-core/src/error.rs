//! # Error Types
//!
//! Domain-specific error types for medix-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medix-core errors (this file)                                         │
//! │  ├── CoreError        - Allocation / state machine failures            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  medix-db errors                                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  medix-settlement errors                                               │
//! │  └── SettlementError  - What the checkout / refund caller sees         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SettlementError → caller         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Not enough eligible (unexpired, non-empty) stock to cover a request.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line: Paracetamol × 8
    ///      │
    ///      ▼
    /// Eligible batches hold 5 units
    ///      │
    ///      ▼
    /// InsufficientStock { medicine_id, available: 5, requested: 8 }
    ///      │
    ///      ▼
    /// UI shows: "Only 5 Paracetamol in stock"
    /// ```
    #[error("Medicine {medicine_id} is short: available {available}, requested {requested}")]
    InsufficientStock {
        medicine_id: String,
        available: i64,
        requested: i64,
    },

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Refunding a sale that is already fully refunded
    #[error("Sale {invoice_number} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        invoice_number: String,
        current_status: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store access; surfaced verbatim to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid mobile number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., the same sale line twice in one refund).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// The request contains no lines.
    #[error("{field} must not be empty")]
    Empty { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
