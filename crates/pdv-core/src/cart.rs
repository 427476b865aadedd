//! # Cart Resolution
//!
//! Turns what the checkout screen sends into the exact values a sale header
//! and its lines are written with.
//!
//! ## Two Input Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart::Items([...])            Cart::Checkout { code, subtotal, total,  │
//! │  plain list of lines                            discount, payment,      │
//! │          │                                      received, change,       │
//! │          │                                      items }                 │
//! │          │                                │                             │
//! │          └──────────────┬─────────────────┘                             │
//! │                         ▼                                               │
//! │            resolve(options, generate_code)                              │
//! │                         │                                               │
//! │   values carried by the checkout win over SaleOptions                   │
//! │                         ▼                                               │
//! │                   ResolvedSale                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Totals
//! - total = checkout total, else checkout subtotal − discount,
//!   else Σ line subtotals − discount
//! - change = checkout change, else max(received − total, 0)

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::validation::{validate_non_negative, validate_price, validate_quantity};
use crate::{DEFAULT_OPERATOR_ID, MAX_AMOUNT_CENTS};

// =============================================================================
// Input Types
// =============================================================================

/// One line of a cart, keyed by product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub code: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Overrides `unit_price × quantity` when the screen applied a line
    /// discount.
    #[serde(default)]
    pub subtotal: Option<Money>,
}

impl CartLine {
    pub fn new(code: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        CartLine {
            code: code.into(),
            quantity,
            unit_price,
            subtotal: None,
        }
    }

    /// The line subtotal actually charged.
    pub fn subtotal(&self) -> Money {
        self.subtotal
            .unwrap_or_else(|| self.unit_price.multiply_quantity(self.quantity))
    }
}

/// Everything the checkout screen knows about a sale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Checkout {
    pub code: Option<String>,
    pub subtotal: Option<Money>,
    pub total: Option<Money>,
    #[ts(as = "Option<String>")]
    pub payment_method: Option<PaymentMethod>,
    pub discount: Option<Money>,
    pub amount_received: Option<Money>,
    pub change: Option<Money>,
    pub items: Vec<CartLine>,
}

/// A cart as handed to the sale recorder.
///
/// Untagged: a JSON array is a plain item list, a JSON object is a checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum Cart {
    Items(Vec<CartLine>),
    Checkout(Checkout),
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        match self {
            Cart::Items(items) => items,
            Cart::Checkout(checkout) => &checkout.items,
        }
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(items: Vec<CartLine>) -> Self {
        Cart::Items(items)
    }
}

impl From<Checkout> for Cart {
    fn from(checkout: Checkout) -> Self {
        Cart::Checkout(checkout)
    }
}

/// Values passed next to the cart. Checkout fields take precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleOptions {
    pub operator_id: i64,
    pub payment_method: PaymentMethod,
    pub discount: Money,
    pub amount_received: Money,
}

impl Default for SaleOptions {
    fn default() -> Self {
        SaleOptions {
            operator_id: DEFAULT_OPERATOR_ID,
            payment_method: PaymentMethod::default(),
            discount: Money::zero(),
            amount_received: Money::zero(),
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Final values of a sale, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSale {
    pub code: String,
    pub operator_id: i64,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub discount: Money,
    pub amount_received: Money,
    pub change: Money,
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Resolves the cart against `options`.
    ///
    /// `generate_code` is only called when the cart carries no sale code.
    ///
    /// ## Example
    /// ```rust
    /// use pdv_core::{Cart, CartLine, Money, SaleOptions};
    ///
    /// let cart = Cart::Items(vec![
    ///     CartLine::new("CAM-001", 2, Money::from_cents(4990)),
    ///     CartLine::new("BON-002", 1, Money::from_cents(2500)),
    /// ]);
    /// let options = SaleOptions {
    ///     discount: Money::from_cents(480),
    ///     amount_received: Money::from_cents(15000),
    ///     ..SaleOptions::default()
    /// };
    /// let sale = cart.resolve(options, || "V1".to_string()).unwrap();
    /// assert_eq!(sale.total.cents(), 12000);
    /// assert_eq!(sale.change.cents(), 3000);
    /// ```
    pub fn resolve(
        self,
        options: SaleOptions,
        generate_code: impl FnOnce() -> String,
    ) -> CoreResult<ResolvedSale> {
        let (checkout, lines) = match self {
            Cart::Items(items) => (Checkout::default(), items),
            Cart::Checkout(mut checkout) => {
                let items = std::mem::take(&mut checkout.items);
                (checkout, items)
            }
        };

        for line in &lines {
            validate_quantity(line.quantity)?;
            validate_price(line.unit_price)?;
            if let Some(subtotal) = line.subtotal {
                validate_non_negative("subtotal", subtotal)?;
            }
        }

        let discount = checkout.discount.unwrap_or(options.discount);
        let amount_received = checkout.amount_received.unwrap_or(options.amount_received);
        validate_non_negative("discount", discount)?;
        validate_non_negative("amount received", amount_received)?;
        if let Some(subtotal) = checkout.subtotal {
            validate_non_negative("subtotal", subtotal)?;
        }

        let total = match (checkout.total, checkout.subtotal) {
            (Some(total), _) => total,
            (None, Some(subtotal)) => subtotal - discount,
            (None, None) => {
                let subtotal = lines
                    .iter()
                    .try_fold(Money::zero(), |acc, line| acc.checked_add(line.subtotal()))
                    .ok_or_else(|| ValidationError::OutOfRange {
                        field: "total".to_string(),
                        min: 0,
                        max: MAX_AMOUNT_CENTS,
                    })?;
                subtotal - discount
            }
        };
        validate_non_negative("total", total)?;
        if let Some(change) = checkout.change {
            validate_non_negative("change", change)?;
        }

        let change = checkout
            .change
            .unwrap_or_else(|| (amount_received - total).max_zero());

        let code = match checkout.code.map(|c| c.trim().to_string()) {
            Some(code) if !code.is_empty() => code,
            _ => generate_code(),
        };

        Ok(ResolvedSale {
            code,
            operator_id: options.operator_id,
            total,
            payment_method: checkout.payment_method.unwrap_or(options.payment_method),
            discount,
            amount_received,
            change,
            lines,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
