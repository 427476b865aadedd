//! # Domain Types
//!
//! Core domain types used throughout SnapDev PDV.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  CashRegister   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (rowid)     │   │  id (rowid)     │   │  singleton row  │       │
//! │  │  code (unique)  │   │  code (V+uuid)  │   │  state          │       │
//! │  │  price          │   │  total          │   │  current_balance│       │
//! │  │  quantity       │   │  payment_method │   │  opened_at      │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │                     │                     │                 │
//! │  ┌────────▼────────┐   ┌────────▼────────┐   ┌────────▼────────┐       │
//! │  │ StockMovement   │   │    SaleItem     │   │  CashMovement   │       │
//! │  │  venda / ajuste │   │  unit_price     │   │  MovementKind   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Labels
//! The store is shared with an existing desktop install, so enum values are
//! persisted with their Portuguese labels (`aberto`, `entrada`, `vendedor`,
//! `Dinheiro`, ...). The Rust names are English; `as_str`/`parse` convert.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::TIMESTAMP_FORMAT;

// =============================================================================
// Timestamps
// =============================================================================

/// Current local wall-clock time truncated to whole seconds.
///
/// Every timestamp the store writes goes through here so that values compare
/// correctly against the `YYYY-MM-DD HH:MM:SS` text already on disk.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Formats a timestamp in the store layout.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// Most descriptive columns are nullable in stores created by older releases,
/// hence the `Option`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: i64,

    /// Human-entered business identifier (barcode or shelf code). Unique.
    pub code: String,

    pub name: String,
    pub description: Option<String>,
    pub price: Money,

    /// Units on hand. May be negative after a sale of unstocked goods.
    pub quantity: i64,

    /// Low-stock threshold.
    pub min_quantity: i64,

    pub category: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,

    /// File name under the images directory, see `ImageStore`.
    pub image: Option<String>,

    #[ts(as = "Option<String>")]
    pub created_at: Option<NaiveDateTime>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Product {
    /// Whether stock is at or below the low-stock threshold.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// Input for creating or updating a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDraft {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub quantity: i64,
    pub min_quantity: i64,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Stock movement type written by sale registration.
pub const STOCK_MOVEMENT_SALE: &str = "venda";

/// Stock movement type written by a manual adjustment.
pub const STOCK_MOVEMENT_ADJUSTMENT: &str = "ajuste";

/// One entry of the append-only stock audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i64,
    /// Signed delta applied to the product quantity.
    pub quantity: i64,
    /// `venda` or `ajuste`; older stores may hold other labels.
    pub kind: String,
    /// Sale code for `venda`, free text otherwise.
    pub reference: Option<String>,
    #[ts(as = "Option<String>")]
    pub moved_at: Option<NaiveDateTime>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
///
/// Stored as the label shown on the checkout screen. Labels typed in by hand
/// on older installs are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Pix,
    Other(String),
}

impl PaymentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::CreditCard => "Cartão de Crédito",
            PaymentMethod::DebitCard => "Cartão de Débito",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Other(label) => label,
        }
    }

    /// Parses a stored label, tolerating case and missing accents.
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "dinheiro" | "cash" => PaymentMethod::Cash,
            "cartão de crédito" | "cartao de credito" | "crédito" | "credito" => {
                PaymentMethod::CreditCard
            }
            "cartão de débito" | "cartao de debito" | "débito" | "debito" => {
                PaymentMethod::DebitCard
            }
            "pix" => PaymentMethod::Pix,
            _ => PaymentMethod::Other(label.trim().to_string()),
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PaymentMethod {
    fn from(label: String) -> Self {
        PaymentMethod::parse(&label)
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.as_str().to_string()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale header. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub operator_id: Option<i64>,
    pub total: Money,
    #[ts(as = "String")]
    pub payment_method: PaymentMethod,
    pub discount: Money,
    #[ts(as = "Option<String>")]
    pub sold_at: Option<NaiveDateTime>,
    /// `V` followed by 32 hex digits for sales recorded by this crate.
    pub code: Option<String>,
    pub amount_received: Money,
    pub change: Money,
}

/// A line item of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// A sale header together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Outcome of registering a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordedSale {
    pub sale_id: i64,
    pub code: String,
    pub total: Money,
    /// Number of lines written to the store.
    pub items_recorded: usize,
    /// Product codes from the cart that matched no product.
    pub skipped_codes: Vec<String>,
}

// =============================================================================
// Cash Register
// =============================================================================

/// Stored state of the cash register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum RegisterState {
    #[serde(rename = "aberto")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "aberto"))]
    Open,
    #[serde(rename = "fechado")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "fechado"))]
    Closed,
}

impl RegisterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterState::Open => "aberto",
            RegisterState::Closed => "fechado",
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, RegisterState::Open)
    }
}

impl Default for RegisterState {
    fn default() -> Self {
        RegisterState::Closed
    }
}

impl fmt::Display for RegisterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The singleton cash register row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashRegister {
    pub id: i64,
    pub opening_balance: Money,
    pub current_balance: Money,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<NaiveDateTime>,
    pub state: RegisterState,
    /// Start of the current session. Closing summaries cover movements from
    /// here on.
    #[ts(as = "Option<String>")]
    pub opened_at: Option<NaiveDateTime>,
}

/// Kind of a cash ledger entry.
///
/// ```text
///   abertura ──► entrada / venda (+)  ──► fechamento
///                saida / other   (-)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MovementKind {
    /// Written by `open`.
    Opening,
    /// Cash put into the drawer.
    Inflow,
    /// Cash received for a sale.
    Sale,
    /// Cash taken out of the drawer.
    Outflow,
    /// Written by `close`.
    Closing,
    /// Any other label found in an older ledger. Treated as an outflow.
    Other(String),
}

impl MovementKind {
    pub fn as_str(&self) -> &str {
        match self {
            MovementKind::Opening => "abertura",
            MovementKind::Inflow => "entrada",
            MovementKind::Sale => "venda",
            MovementKind::Outflow => "saida",
            MovementKind::Closing => "fechamento",
            MovementKind::Other(label) => label,
        }
    }

    /// Parses a ledger label, case-insensitively.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "abertura" => MovementKind::Opening,
            "entrada" => MovementKind::Inflow,
            "venda" => MovementKind::Sale,
            "saida" | "saída" => MovementKind::Outflow,
            "fechamento" => MovementKind::Closing,
            _ => MovementKind::Other(label.trim().to_string()),
        }
    }

    /// Whether the amount is added to the balance.
    ///
    /// Older releases subtracted `venda` rows from the balance while counting
    /// them as entries on the closing report. Both paths add them here, so the
    /// report and the balance agree.
    #[inline]
    pub fn is_inflow(&self) -> bool {
        matches!(self, MovementKind::Inflow | MovementKind::Sale)
    }

    /// Opening and closing entries are written only by the register itself.
    #[inline]
    pub fn is_reserved(&self) -> bool {
        matches!(self, MovementKind::Opening | MovementKind::Closing)
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MovementKind {
    fn from(label: String) -> Self {
        MovementKind::parse(&label)
    }
}

impl From<MovementKind> for String {
    fn from(kind: MovementKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One entry of the cash ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashMovement {
    pub id: i64,
    #[ts(as = "Option<String>")]
    pub recorded_at: Option<NaiveDateTime>,
    #[ts(as = "String")]
    pub kind: MovementKind,
    pub description: String,
    /// Always stored positive; `kind` carries the sign.
    pub amount: Money,
}

// =============================================================================
// Users
// =============================================================================

/// Operator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "vendedor")]
    Seller,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Seller => "vendedor",
        }
    }

    /// Anything other than `admin` is a seller.
    pub fn parse(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("admin") {
            UserRole::Admin
        } else {
            UserRole::Seller
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Seller
    }
}

/// An operator account. The password hash never leaves the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub role: UserRole,
    #[ts(as = "Option<String>")]
    pub created_at: Option<NaiveDateTime>,
}

/// Input for registering an operator.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

// =============================================================================
// Reports
// =============================================================================

/// Inclusive timestamp window for reports. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "Option<String>")]
    pub start: Option<NaiveDateTime>,
    #[ts(as = "Option<String>")]
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    /// No bounds: every row.
    pub fn all() -> Self {
        DateRange::default()
    }

    /// Whole days, from the first second of `start` to `23:59:59` of `end`.
    pub fn days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange {
            start: start.map(|d| d.and_time(NaiveTime::MIN)),
            end: end.map(end_of_day),
        }
    }

    /// Parses bounds typed as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
    ///
    /// A date-only end covers the whole day.
    ///
    /// ```rust
    /// use pdv_core::types::DateRange;
    ///
    /// let range = DateRange::parse(Some("2024-03-01"), Some("2024-03-31")).unwrap();
    /// assert_eq!(range.end.unwrap().to_string(), "2024-03-31 23:59:59");
    /// ```
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ValidationError> {
        let start = match start.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_bound("start", s, false)?),
            None => None,
        };
        let end = match end.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_bound("end", s, true)?),
            None => None,
        };
        Ok(DateRange { start, end })
    }

    /// Whether `ts` falls inside the window.
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end.map_or(true, |e| *ts <= e)
    }
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

fn parse_bound(field: &str, raw: &str, is_end: bool) -> Result<NaiveDateTime, ValidationError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Ok(ts);
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) if is_end => Ok(end_of_day(date)),
        Ok(date) => Ok(date.and_time(NaiveTime::MIN)),
        Err(_) => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".to_string(),
        }),
    }
}

/// Aggregated sales of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopProduct {
    pub product_id: i64,
    /// `None` when the product has since been deleted.
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity_sold: i64,
    pub revenue: Money,
}

/// Totals over a set of sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub sale_count: i64,
    pub revenue: Money,
    pub average_ticket: Money,
}

impl SalesSummary {
    /// Builds a summary; the average is rounded down to the centavo.
    pub fn new(sale_count: i64, revenue: Money) -> Self {
        let average_ticket = if sale_count > 0 {
            Money::from_cents(revenue.cents() / sale_count)
        } else {
            Money::zero()
        };
        SalesSummary {
            sale_count,
            revenue,
            average_ticket,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_labels() {
        assert_eq!(PaymentMethod::default().as_str(), "Dinheiro");
        assert_eq!(PaymentMethod::parse("dinheiro"), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::parse("Cartao de Credito"), PaymentMethod::CreditCard);
        assert_eq!(PaymentMethod::parse("PIX"), PaymentMethod::Pix);
        assert_eq!(
            PaymentMethod::parse("Vale"),
            PaymentMethod::Other("Vale".to_string())
        );
    }

    #[test]
    fn test_payment_method_serializes_as_label() {
        let json = serde_json::to_string(&PaymentMethod::DebitCard).unwrap();
        assert_eq!(json, "\"Cartão de Débito\"");
        let back: PaymentMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PaymentMethod::DebitCard);
    }

    #[test]
    fn test_movement_kind_parse() {
        assert_eq!(MovementKind::parse("ENTRADA"), MovementKind::Inflow);
        assert_eq!(MovementKind::parse("saída"), MovementKind::Outflow);
        assert!(MovementKind::parse("venda").is_inflow());
        assert!(!MovementKind::parse("sangria").is_inflow());
        assert!(MovementKind::Opening.is_reserved());
        assert!(!MovementKind::Inflow.is_reserved());
    }

    #[test]
    fn test_register_state_labels() {
        assert_eq!(RegisterState::default(), RegisterState::Closed);
        assert_eq!(serde_json::to_string(&RegisterState::Open).unwrap(), "\"aberto\"");
        assert!(RegisterState::Open.is_open());
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!(UserRole::parse("admin"), UserRole::Admin);
        assert_eq!(UserRole::parse("vendedor"), UserRole::Seller);
        assert_eq!(UserRole::parse("caixa"), UserRole::Seller);
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse(Some("2024-03-01"), Some("2024-03-31")).unwrap();
        assert_eq!(format_timestamp(&range.start.unwrap()), "2024-03-01 00:00:00");
        assert_eq!(format_timestamp(&range.end.unwrap()), "2024-03-31 23:59:59");

        let exact = DateRange::parse(None, Some("2024-03-31 12:00:00")).unwrap();
        assert!(exact.start.is_none());
        assert_eq!(format_timestamp(&exact.end.unwrap()), "2024-03-31 12:00:00");

        assert!(DateRange::parse(Some("31/03/2024"), None).is_err());
        assert_eq!(DateRange::parse(Some(""), None).unwrap(), DateRange::all());
    }

    #[test]
    fn test_date_range_contains() {
        let range = DateRange::days(NaiveDate::from_ymd_opt(2024, 1, 1), None);
        let inside = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let before = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert!(range.contains(&inside));
        assert!(!range.contains(&before));
    }

    #[test]
    fn test_sales_summary_average() {
        let summary = SalesSummary::new(3, Money::from_cents(1000));
        assert_eq!(summary.average_ticket.cents(), 333);
        assert_eq!(SalesSummary::new(0, Money::zero()).average_ticket, Money::zero());
    }

    #[test]
    fn test_local_now_has_no_fraction() {
        assert_eq!(local_now().nanosecond(), 0);
    }
}
