//! # medix-core: Pure Settlement Logic for Medix
//!
//! This crate is the **heart** of the pharmacy settlement engine. It holds
//! the domain types, the FEFO allocation engine and the pricing calculator
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Medix Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              medix-settlement (checkout / refund)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ medix-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │allocation │  │  pricing  │  │   │
//! │  │   │ Medicine  │  │   Money   │  │   FEFO    │  │ discount  │  │   │
//! │  │   │ Batch     │  │ Discount  │  │ Snapshot  │  │   VAT     │  │   │
//! │  │   │ Sale      │  │ TaxRate   │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    medix-db (Database Layer)                    │   │
//! │  │        SQLite catalog, batch ledger, sale record store          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, Batch, Sale, SaleLine, ...)
//! - [`money`] - Money type with integer cents and rate types
//! - [`allocation`] - First-Expiry-First-Out batch allocation
//! - [`pricing`] - Subtotal / discount / VAT / total calculation
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use medix_core::money::{DiscountRate, Money};
//! use medix_core::pricing::{price_lines, LineAmount};
//! use medix_core::VAT_RATE;
//!
//! let lines = [LineAmount::new(2, Money::from_cents(1000))];
//! let breakdown = price_lines(&lines, DiscountRate::zero(), VAT_RATE).unwrap();
//! let totals = breakdown.settle();
//!
//! // 2 × 10.00 = 20.00, VAT 13% = 2.60
//! assert_eq!(totals.total.cents(), 2260);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::{allocate, Allocation, StockSnapshot};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{DiscountRate, Money, TaxRate};
pub use pricing::{price_lines, LineAmount, PricingBreakdown, SettledTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fixed VAT rate applied to the discounted subtotal (13%).
pub const VAT_RATE: TaxRate = TaxRate::from_bps(1300);

/// Maximum lines allowed in a single checkout.
///
/// ## Business Reason
/// Prevents runaway carts and keeps one settlement transaction small.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single medicine line.
///
/// ## Business Reason
/// Prevents accidental over-dispensing (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest unit price (or cost) a batch may carry, in cents (1,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Most units a single batch may hold, on receipt or after an adjustment.
pub const MAX_BATCH_QUANTITY: i64 = 1_000_000;
