//! # Maintenance Repository
//!
//! Bulk deletes used by the admin screen to reset parts of the store.
//!
//! ```text
//! clear_products   itens_venda, movimentacoes_estoque, produtos
//! clear_sales      itens_venda, vendas, sale entries of movimentos_caixa;
//!                  caixa.saldo_atual loses what those entries added
//! clear_cash_flow  movimentos_caixa; caixa zeroed and closed
//! ```
//!
//! Each runs in one transaction. Users are never touched.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::cash::CashRegisterRepository;
use crate::error::DbResult;
use pdv_core::register::apply_movement;
use pdv_core::{Money, MovementKind};

/// Cash ledger rows written for a sale.
const SALE_ENTRY_FILTER: &str =
    "(LOWER(tipo) = 'venda' OR (LOWER(tipo) = 'entrada' AND descricao LIKE '%Venda%'))";

/// Repository for destructive maintenance operations.
#[derive(Debug, Clone)]
pub struct MaintenanceRepository {
    pool: SqlitePool,
}

impl MaintenanceRepository {
    /// Creates a new MaintenanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MaintenanceRepository { pool }
    }

    /// Deletes every product with its stock trail and the sale lines that
    /// reference it. Sale headers are kept.
    pub async fn clear_products(&self) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM itens_venda").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM movimentacoes_estoque")
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM produtos")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        info!(deleted, "Products cleared");
        Ok(deleted)
    }

    /// Deletes every sale with its lines and the cash entries it produced.
    ///
    /// Entries recorded after the latest opening or closing row were folded
    /// into the current balance, so their amounts are taken back out of it.
    /// Stock trail rows of kind `venda` stay, as do product quantities.
    pub async fn clear_sales(&self) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM itens_venda").execute(&mut *tx).await?;
        let deleted = sqlx::query("DELETE FROM vendas")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let in_balance: Vec<(String, f64)> = sqlx::query_as(&format!(
            r#"
            SELECT tipo, COALESCE(valor, 0.0)
            FROM movimentos_caixa
            WHERE {}
              AND id > (
                  SELECT COALESCE(MAX(id), 0) FROM movimentos_caixa
                  WHERE LOWER(tipo) IN ('abertura', 'fechamento')
              )
            "#,
            SALE_ENTRY_FILTER
        ))
        .fetch_all(&mut *tx)
        .await?;

        let added = in_balance.iter().fold(Money::zero(), |acc, (kind, amount)| {
            apply_movement(acc, &MovementKind::parse(kind), Money::from_real(*amount))
        });

        sqlx::query(&format!("DELETE FROM movimentos_caixa WHERE {}", SALE_ENTRY_FILTER))
            .execute(&mut *tx)
            .await?;

        if !added.is_zero() {
            let register: Option<(i64, f64)> =
                sqlx::query_as("SELECT id, COALESCE(saldo_atual, 0.0) FROM caixa ORDER BY id LIMIT 1")
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some((register_id, balance)) = register {
                let balance = Money::from_real(balance) - added;
                sqlx::query("UPDATE caixa SET saldo_atual = ? WHERE id = ?")
                    .bind(balance.to_real())
                    .bind(register_id)
                    .execute(&mut *tx)
                    .await?;
                debug!(register_id, removed = %added, balance = %balance, "Cash balance adjusted");
            }
        }

        tx.commit().await?;

        info!(deleted, "Sales cleared");
        Ok(deleted)
    }

    /// Deletes the cash ledger and closes the register.
    pub async fn clear_cash_flow(&self) -> DbResult<()> {
        CashRegisterRepository::new(self.pool.clone())
            .clear_cash_flow()
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
