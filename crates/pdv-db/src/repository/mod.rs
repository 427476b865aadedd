//! # Repository Module
//!
//! Database repositories for SnapDev PDV.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Presentation layer                                                     │
//! │       │                                                                 │
//! │       │  db.sales().register_sale(cart, options)                        │
//! │       ▼                                                                 │
//! │  Database (pool.rs) ── hands out repositories holding a pool clone      │
//! │       │                                                                 │
//! │       ├── ProductRepository      produtos, movimentacoes_estoque        │
//! │       ├── SaleRepository         vendas, itens_venda                    │
//! │       ├── CashRegisterRepository caixa, movimentos_caixa                │
//! │       ├── UserRepository         usuarios                               │
//! │       ├── ReportRepository       read-only aggregates                   │
//! │       └── MaintenanceRepository  bulk resets                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (legacy Portuguese table names, English Rust names)             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules decided without I/O (totals, balances, validation) live in
//! `pdv-core`; repositories only load, call into the core and persist.

pub mod cash;
pub mod maintenance;
pub mod product;
pub mod report;
pub mod sale;
pub mod user;
