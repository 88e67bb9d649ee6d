//! # Validation Module
//!
//! Input validation utilities for Medix.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request DTO (serde)                                          │
//! │  └── Type validation (deserialization, closed enums)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Settlement entry points                                      │
//! │  └── THIS MODULE: Business rule validation, before any store access    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── UNIQUE (invoice_number), UNIQUE (medicine_id, batch_number)       │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use medix_core::validation::{validate_mobile, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! validate_mobile(Some("+9779800000000")).unwrap();
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_BATCH_QUANTITY, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a medicine name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use medix_core::validation::validate_medicine_name;
///
/// assert!(validate_medicine_name("Paracetamol 500mg").is_ok());
/// assert!(validate_medicine_name("").is_err());
/// ```
pub fn validate_medicine_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, 200)
}

/// Validates a supplier batch (lot) number.
///
/// ## Rules
/// - Must not be empty, at most 50 characters
/// - Letters, digits, hyphens, underscores and slashes only
///
/// ## Example
/// ```rust
/// use medix_core::validation::validate_batch_number;
///
/// assert!(validate_batch_number("PCM-2025/01").is_ok());
/// assert!(validate_batch_number("lot 1").is_err());
/// ```
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    validate_required_text("batch_number", batch_number, 50)?;

    if !batch_number
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_number".to_string(),
            reason: "must contain only letters, numbers, '-', '_' and '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates the staff identifier attached to a sale or refund.
pub fn validate_staff_id(staff_id: &str) -> ValidationResult<()> {
    validate_required_text("staff_id", staff_id, 64)
}

/// Validates an optional customer name.
pub fn validate_customer_name(name: Option<&str>) -> ValidationResult<()> {
    match name {
        Some(name) if name.chars().count() > 100 => Err(ValidationError::TooLong {
            field: "customer_name".to_string(),
            max: 100,
        }),
        _ => Ok(()),
    }
}

/// Validates an optional customer mobile number.
///
/// ## Rules
/// - Absent or blank is fine (walk-in customer)
/// - Optional leading `+`, then 7 to 15 digits
/// - Spaces and hyphens are tolerated as separators
///
/// ## Example
/// ```rust
/// use medix_core::validation::validate_mobile;
///
/// assert!(validate_mobile(None).is_ok());
/// assert!(validate_mobile(Some("98-0000-0000")).is_ok());
/// assert!(validate_mobile(Some("call me")).is_err());
/// ```
pub fn validate_mobile(mobile: Option<&str>) -> ValidationResult<()> {
    let Some(mobile) = mobile.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(());
    };

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "customer_mobile".to_string(),
        reason: reason.to_string(),
    };

    let digits_part = mobile.strip_prefix('+').unwrap_or(mobile);
    if !digits_part
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err(invalid("must contain only digits, spaces, '-' and a leading '+'"));
    }

    let digits = digits_part.chars().filter(char::is_ascii_digit).count();
    if !(7..=15).contains(&digits) {
        return Err(invalid("must contain between 7 and 15 digits"));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout line: Amoxicillin × qty                                       │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(qty) ← THIS FUNCTION                                │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → Proceed to allocation                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free samples)
/// - At most MAX_PRICE_CENTS (1,000,000.00)
///
/// ## Example
/// ```rust
/// use medix_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("sale_price", 1099).is_ok());
/// assert!(validate_price_cents("sale_price", 0).is_ok());
/// assert!(validate_price_cents("sale_price", -100).is_err());
/// assert!(validate_price_cents("sale_price", i64::MAX / 10).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a request.
///
/// ## Rules
/// - At least one line
/// - At most MAX_CART_ITEMS (100)
pub fn validate_line_count(field: &str, count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }

    if count > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Receipt Validators
// =============================================================================

/// Validates the fields of an incoming stock receipt.
///
/// ## Rules
/// - Batch number well-formed
/// - Quantity 1 to MAX_BATCH_QUANTITY
/// - Prices 0 to MAX_PRICE_CENTS
/// - Expiry strictly after manufacture
pub fn validate_receipt(
    batch_number: &str,
    quantity: i64,
    manufactured_date: NaiveDate,
    expiry_date: NaiveDate,
    sale_price_cents: i64,
    purchase_cost_cents: i64,
) -> ValidationResult<()> {
    validate_batch_number(batch_number)?;

    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_BATCH_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_BATCH_QUANTITY,
        });
    }

    validate_price_cents("sale_price", sale_price_cents)?;
    validate_price_cents("purchase_cost", purchase_cost_cents)?;

    if expiry_date <= manufactured_date {
        return Err(ValidationError::InvalidFormat {
            field: "expiry_date".to_string(),
            reason: "must be after manufactured_date".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use medix_core::validation::validate_uuid;
///
/// assert!(validate_uuid("medicine_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("medicine_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
