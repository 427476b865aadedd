//! # pdv-db: Database Layer for SnapDev PDV
//!
//! This crate owns the local store of the PDV: one SQLite file holding
//! products, sales, the cash register and operators, plus the product
//! image directory next to it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SnapDev PDV Data Flow                            │
//! │                                                                         │
//! │  Presentation layer (checkout, stock, cash and admin screens)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     pdv-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │   │
//! │  │   │   (pool.rs)   │    │               │    │  + schema    │    │   │
//! │  │   │               │    │ products      │    │    repair    │    │   │
//! │  │   │ SqlitePool    │◄───│ sales, cash   │    │ 001_initial  │    │   │
//! │  │   │ AppConfig     │    │ users, reports│    │              │    │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   ImageStore (images.rs) ── <data_dir>/images/<code><ext>       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  <data_dir>/database.db                                         │   │
//! │  │  Windows: %LOCALAPPDATA%\SnapDev PDV   elsewhere: ~/snapdev_pdv  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `AppConfig` (TOML file + environment)
//! - [`pool`] - Connection pool creation and startup sequence
//! - [`schema`] - Column repair for stores written by older releases
//! - [`migrations`] - Embedded database migrations
//! - [`images`] - Product image files
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdv_db::{AppConfig, Database, DbConfig};
//!
//! let config = AppConfig::load(None)?;
//! let db = Database::new(DbConfig::from_app_config(&config)).await?;
//!
//! db.cash().open(Money::from_cents(10000)).await?;
//! let recorded = db.sales().register_sale(cart, SaleOptions::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod images;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use images::ImageStore;
pub use pool::{Database, DbConfig};
pub use schema::RepairReport;

// Repository re-exports for convenience
pub use repository::cash::CashRegisterRepository;
pub use repository::maintenance::MaintenanceRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;
