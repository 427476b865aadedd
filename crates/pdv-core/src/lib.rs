//! # pdv-core: Pure Business Logic for SnapDev PDV
//!
//! All business rules of the point-of-sale back office live here as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SnapDev PDV Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Presentation layer (out of tree)                  │   │
//! │  │    Checkout ──► Cash register ──► Stock ──► Reports             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pdv-core (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │ register  │  │   │
//! │  │   │  Product  │  │   Money   │  │ Checkout  │  │ summaries │  │   │
//! │  │   │   Sale    │  │  (cents)  │  │  totals   │  │  balance  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • PURE FUNCTIONS                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    pdv-db (Database Layer)                      │   │
//! │  │        SQLite queries, migrations, schema repair, repos         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, CashRegister, User, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Resolution of a checkout into a sale header and lines
//! - [`register`] - Cash register balance and closing-summary math
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use pdv_core::money::Money;
//!
//! let price = Money::from_cents(4990); // R$ 49,90
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 9980);
//! assert_eq!(line.to_string(), "R$ 99,80");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod register;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, Checkout, ResolvedSale, SaleOptions};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use register::CashClosingSummary;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Operator recorded on a sale when the caller does not name one.
///
/// The seeded `admin` account is the first row of `usuarios` in a fresh store.
pub const DEFAULT_OPERATOR_ID: i64 = 1;

/// Operator name written on a closing movement when none is given.
pub const DEFAULT_CLOSING_OPERATOR: &str = "sistema";

/// Maximum quantity of a single line in a sale.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest price or cash amount accepted, in centavos (R$ 1.000.000.000,00).
///
/// Keeps `price × MAX_ITEM_QUANTITY` far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Timestamp layout shared with the legacy store (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
