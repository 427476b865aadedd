//! # Legacy Schema Repair
//!
//! Brings tables written by older desktop releases up to the current column
//! set before the migrations run.
//!
//! ## Startup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Database::new                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  schema::repair  ← THIS MODULE                                          │
//! │       │   for each existing table in REQUIRED_COLUMNS:                  │
//! │       │     pragma_table_info ─► missing? ─► ALTER TABLE ADD COLUMN     │
//! │       │                                       │                         │
//! │       │                                       └─► backfill if needed    │
//! │       ▼                                                                 │
//! │  migrations::run_migrations  (creates whatever is still missing)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  users().ensure_default_admin()                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Columns are only ever added. A failed `ALTER` is logged and recorded in the
//! report; startup carries on. Running the repair on an up-to-date store adds
//! nothing.

use pdv_core::register::legacy_status;
use pdv_core::{Money, MovementKind, RegisterState};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Columns every table must have, with the definition used to add them.
///
/// `ALTER TABLE ADD COLUMN` accepts neither UNIQUE nor non-constant defaults,
/// so definitions here are looser than in `001_initial_schema.sql`.
/// Order matters: the ledger is repaired before `caixa`, and `aberto_em`
/// before `status`, because the status backfill reads both.
pub const REQUIRED_COLUMNS: &[(&str, &[(&str, &str)])] = &[
    (
        "usuarios",
        &[
            ("nome", "TEXT NOT NULL DEFAULT ''"),
            ("usuario", "TEXT"),
            ("senha", "TEXT NOT NULL DEFAULT ''"),
            ("tipo", "TEXT NOT NULL DEFAULT 'vendedor'"),
            ("created_at", "TIMESTAMP"),
        ],
    ),
    (
        "produtos",
        &[
            ("codigo", "TEXT"),
            ("nome", "TEXT NOT NULL DEFAULT ''"),
            ("descricao", "TEXT"),
            ("preco", "REAL NOT NULL DEFAULT 0"),
            ("quantidade", "INTEGER NOT NULL DEFAULT 0"),
            ("min_quantidade", "INTEGER NOT NULL DEFAULT 0"),
            ("categoria", "TEXT"),
            ("marca", "TEXT"),
            ("tamanho", "TEXT"),
            ("cor", "TEXT"),
            ("imagem", "TEXT"),
            ("created_at", "TIMESTAMP"),
            ("updated_at", "TIMESTAMP"),
        ],
    ),
    (
        "vendas",
        &[
            ("usuario_id", "INTEGER"),
            ("valor_total", "REAL NOT NULL DEFAULT 0"),
            ("forma_pagamento", "TEXT NOT NULL DEFAULT 'Dinheiro'"),
            ("desconto", "REAL NOT NULL DEFAULT 0"),
            ("data_venda", "TIMESTAMP"),
            ("codigo", "TEXT"),
            ("valor_recebido", "REAL NOT NULL DEFAULT 0"),
            ("troco", "REAL NOT NULL DEFAULT 0"),
        ],
    ),
    (
        "itens_venda",
        &[
            ("quantidade", "INTEGER NOT NULL DEFAULT 0"),
            ("preco_unitario", "REAL NOT NULL DEFAULT 0"),
            ("subtotal", "REAL NOT NULL DEFAULT 0"),
        ],
    ),
    (
        "movimentacoes_estoque",
        &[
            ("tipo_movimento", "TEXT NOT NULL DEFAULT 'ajuste'"),
            ("referencia", "TEXT"),
            ("data_movimento", "TIMESTAMP"),
        ],
    ),
    (
        "movimentos_caixa",
        &[
            ("data", "TIMESTAMP"),
            ("tipo", "TEXT NOT NULL DEFAULT 'entrada'"),
            ("descricao", "TEXT"),
            ("valor", "REAL NOT NULL DEFAULT 0"),
        ],
    ),
    (
        "caixa",
        &[
            ("saldo_inicial", "REAL NOT NULL DEFAULT 0"),
            ("saldo_atual", "REAL NOT NULL DEFAULT 0"),
            ("ultima_atualizacao", "TIMESTAMP"),
            ("aberto_em", "TIMESTAMP"),
            ("status", "TEXT NOT NULL DEFAULT 'fechado'"),
        ],
    ),
];

/// Outcome of a repair pass. Entries are `table.column`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub added: Vec<String>,
    pub failed: Vec<String>,
}

impl RepairReport {
    /// Nothing was missing.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.failed.is_empty()
    }
}

/// Adds missing columns to existing tables. Never fails.
pub async fn repair(pool: &SqlitePool) -> RepairReport {
    let mut report = RepairReport::default();

    for (table, columns) in REQUIRED_COLUMNS {
        let existing = match table_columns(pool, table).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(table, error = %e, "Could not inspect table, skipping repair");
                continue;
            }
        };

        if existing.is_empty() {
            debug!(table, "Table absent, left to migrations");
            continue;
        }

        for (column, definition) in columns.iter() {
            if existing.iter().any(|c| c == column) {
                continue;
            }

            let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
            match sqlx::query(&sql).execute(pool).await {
                Ok(_) => {
                    info!(table, column, "Added missing column");
                    report.added.push(format!("{}.{}", table, column));
                    backfill(pool, table, column, &existing).await;
                }
                Err(e) => {
                    warn!(table, column, error = %e, "Failed to add missing column");
                    report.failed.push(format!("{}.{}", table, column));
                }
            }
        }
    }

    if !report.is_clean() {
        info!(
            added = report.added.len(),
            failed = report.failed.len(),
            "Legacy schema repair finished"
        );
    }

    report
}

/// Column names of `table`; empty when the table does not exist.
async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(pool)
        .await
}

/// Fills a freshly added column from data the legacy table already holds.
async fn backfill(pool: &SqlitePool, table: &str, column: &str, existing: &[String]) {
    let result = match (table, column) {
        ("vendas", "data_venda") if existing.iter().any(|c| c == "data") => sqlx::query(
            "UPDATE vendas SET data_venda = data WHERE data_venda IS NULL",
        )
        .execute(pool)
        .await
        .map(|done| debug!(rows = done.rows_affected(), "Backfilled vendas.data_venda")),
        ("caixa", "status") => async {
            relabel_legacy_ledger(pool).await?;
            backfill_register_state(pool).await
        }
        .await,
        _ => Ok(()),
    };

    if let Err(e) = result {
        warn!(table, column, error = %e, "Backfill failed");
    }
}

/// Gives opening and closing rows their own kinds.
///
/// Older releases wrote the opening row as `entrada`; left as is, the first
/// closing summary would count the opening amount as an entry.
async fn relabel_legacy_ledger(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for (kind, pattern) in [
        (MovementKind::Opening, "%abertura de caixa%"),
        (MovementKind::Closing, "%fechamento de caixa%"),
    ] {
        let done = sqlx::query(
            "UPDATE movimentos_caixa SET tipo = ? WHERE LOWER(descricao) LIKE ? AND tipo <> ?",
        )
        .bind(kind.as_str())
        .bind(pattern)
        .bind(kind.as_str())
        .execute(pool)
        .await?;

        if done.rows_affected() > 0 {
            debug!(kind = %kind, rows = done.rows_affected(), "Relabelled legacy ledger rows");
        }
    }
    Ok(())
}

/// Seeds the stored register state from the legacy ledger heuristic.
async fn backfill_register_state(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let register: Option<(i64, f64)> =
        sqlx::query_as("SELECT id, saldo_atual FROM caixa ORDER BY id ASC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    let Some((register_id, balance)) = register else {
        return Ok(());
    };

    let descriptions: Vec<Option<String>> =
        sqlx::query_scalar("SELECT descricao FROM movimentos_caixa ORDER BY data DESC, id DESC")
            .fetch_all(pool)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Cash ledger unreadable, treating it as empty");
                Vec::new()
            });

    let state = legacy_status(
        descriptions.iter().map(|d| d.as_deref().unwrap_or("")),
        Money::from_real(balance),
    );

    if state == RegisterState::Open {
        sqlx::query(
            r#"
            UPDATE caixa
            SET status = ?,
                aberto_em = COALESCE(
                    aberto_em,
                    (SELECT MAX(data) FROM movimentos_caixa
                     WHERE LOWER(descricao) LIKE '%abertura de caixa%'),
                    (SELECT MIN(data) FROM movimentos_caixa),
                    ultima_atualizacao
                )
            WHERE id = ?
            "#,
        )
        .bind(state.as_str())
        .bind(register_id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query("UPDATE caixa SET status = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(register_id)
            .execute(pool)
            .await?;
    }

    info!(register_id, state = %state, "Seeded cash register state from legacy ledger");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use sqlx::sqlite::SqlitePoolOptions;

    /// Schema and rows as left behind by an early release.
    const LEGACY_STORE: &str = r#"
        CREATE TABLE produtos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            codigo TEXT UNIQUE NOT NULL,
            nome TEXT NOT NULL,
            descricao TEXT,
            preco REAL NOT NULL,
            quantidade INTEGER NOT NULL DEFAULT 0,
            categoria TEXT
        );
        INSERT INTO produtos (codigo, nome, preco, quantidade, categoria)
            VALUES ('CAM-001', 'Camiseta', 49.9, 10, 'Camisetas');
        CREATE TABLE vendas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            usuario_id INTEGER NOT NULL,
            valor_total REAL NOT NULL,
            forma_pagamento TEXT NOT NULL,
            data TIMESTAMP
        );
        INSERT INTO vendas (usuario_id, valor_total, forma_pagamento, data)
            VALUES (1, 49.9, 'Dinheiro', '2023-11-02 10:15:00');
        CREATE TABLE caixa (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            saldo_inicial REAL NOT NULL DEFAULT 0,
            saldo_atual REAL NOT NULL DEFAULT 0,
            ultima_atualizacao TIMESTAMP
        );
        INSERT INTO caixa (saldo_inicial, saldo_atual, ultima_atualizacao)
            VALUES (100, 149.9, '2023-11-02 10:15:00');
        CREATE TABLE movimentos_caixa (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data TIMESTAMP,
            tipo TEXT NOT NULL,
            descricao TEXT,
            valor REAL NOT NULL
        );
        INSERT INTO movimentos_caixa (data, tipo, descricao, valor)
            VALUES ('2023-11-02 08:00:00', 'entrada', 'Abertura de caixa', 100);
        INSERT INTO movimentos_caixa (data, tipo, descricao, valor)
            VALUES ('2023-11-02 10:15:00', 'entrada', 'Venda 1', 49.9)
    "#;

    async fn load_legacy(pool: &SqlitePool) {
        for statement in LEGACY_STORE.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(pool).await.unwrap();
        }
    }

    async fn bare_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_repair_adds_missing_columns() {
        let pool = bare_pool().await;
        load_legacy(&pool).await;

        let report = repair(&pool).await;

        assert!(report.failed.is_empty(), "failed: {:?}", report.failed);
        for column in [
            "produtos.marca",
            "produtos.min_quantidade",
            "vendas.desconto",
            "vendas.data_venda",
            "vendas.codigo",
            "vendas.valor_recebido",
            "caixa.status",
            "caixa.aberto_em",
        ] {
            assert!(report.added.iter().any(|c| c == column), "missing {}", column);
        }

        let columns = table_columns(&pool, "vendas").await.unwrap();
        assert!(columns.iter().any(|c| c == "troco"));
    }

    #[tokio::test]
    async fn test_repair_is_idempotent() {
        let pool = bare_pool().await;
        load_legacy(&pool).await;

        let first = repair(&pool).await;
        assert!(!first.is_clean());

        let second = repair(&pool).await;
        assert!(second.is_clean(), "second pass: {:?}", second);
    }

    #[tokio::test]
    async fn test_repair_on_empty_store_does_nothing() {
        let pool = bare_pool().await;
        assert!(repair(&pool).await.is_clean());
    }

    #[tokio::test]
    async fn test_backfills() {
        let pool = bare_pool().await;
        load_legacy(&pool).await;
        repair(&pool).await;

        let sold_at: String = sqlx::query_scalar("SELECT data_venda FROM vendas")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sold_at, "2023-11-02 10:15:00");

        let (status, opened_at): (String, Option<String>) =
            sqlx::query_as("SELECT status, aberto_em FROM caixa WHERE id = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "aberto");
        assert_eq!(opened_at.as_deref(), Some("2023-11-02 08:00:00"));

        let kinds: Vec<String> = sqlx::query_scalar("SELECT tipo FROM movimentos_caixa ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(kinds, ["abertura", "entrada"]);
    }

    #[tokio::test]
    async fn test_closed_legacy_register() {
        let pool = bare_pool().await;
        load_legacy(&pool).await;
        sqlx::query(
            "INSERT INTO movimentos_caixa (data, tipo, descricao, valor)
             VALUES ('2023-11-02 19:00:00', 'saida', 'Fechamento de caixa - Operador: ana', 149.9)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("UPDATE caixa SET saldo_inicial = 0, saldo_atual = 0")
            .execute(&pool)
            .await
            .unwrap();

        repair(&pool).await;

        let (status, opened_at): (String, Option<String>) =
            sqlx::query_as("SELECT status, aberto_em FROM caixa WHERE id = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "fechado");
        assert!(opened_at.is_none());

        let closing: String = sqlx::query_scalar("SELECT tipo FROM movimentos_caixa WHERE id = 3")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(closing, "fechamento");
    }

    #[tokio::test]
    async fn test_database_opens_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.db");

        {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&format!("sqlite://{}?mode=rwc", path.display()))
                .await
                .unwrap();
            load_legacy(&pool).await;
            pool.close().await;
        }

        let db = Database::new(DbConfig::new(&path)).await.unwrap();

        let product = db.products().get_by_code("CAM-001").await.unwrap().unwrap();
        assert_eq!(product.price.cents(), 4990);
        assert_eq!(product.min_quantity, 0);

        let register = db.cash().current().await.unwrap();
        assert_eq!(register.state, RegisterState::Open);
        assert_eq!(register.current_balance.cents(), 14990);

        let sales = db.sales().list_with_items(&Default::default()).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert!(sales[0].sale.sold_at.is_some());

        assert!(db.users().find_by_username("admin").await.unwrap().is_some());

        db.cash()
            .record_movement(MovementKind::Outflow, "Troco", Money::from_cents(500))
            .await
            .unwrap();
        let summary = db.cash().close(Some("op1"), None).await.unwrap();
        assert_eq!(summary.opening_balance.cents(), 10000);
        assert_eq!(summary.total_entries.cents(), 4990);
        assert_eq!(summary.total_exits.cents(), 500);
        assert_eq!(summary.final_balance.cents(), 14490);
        assert_eq!(
            summary.total_entries - summary.total_exits + summary.opening_balance,
            summary.final_balance
        );
    }
}
