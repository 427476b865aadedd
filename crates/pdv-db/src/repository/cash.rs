//! # Cash Register Repository
//!
//! The singleton register row (`caixa`) and its ledger (`movimentos_caixa`).
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   CLOSED ──── open(x) ────► OPEN ──── close(op, counted) ────► CLOSED   │
//! │     ▲                        │  ▲                                       │
//! │     │                        │  └── record_movement(kind, desc, amt)    │
//! │     │                        │        entrada / venda  → balance + amt  │
//! │     │                        │        saida / other    → balance - amt  │
//! │     │                        │                                          │
//! │     └──── open(x) again ─────┘  (restarts the session)                  │
//! │                                                                         │
//! │  open:   ledger wiped, one 'abertura' row, balance = x, opened_at = now │
//! │  close:  'fechamento' row appended, summary built, balances zeroed      │
//! │          (closed register: rows since the last opening/closing row)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation that touches both tables runs in one transaction. The
//! active register is the row with the lowest id; it is created on demand.

use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use pdv_core::register::{
    apply_movement, closing_description, ensure_can_record, OPENING_DESCRIPTION,
};
use pdv_core::types::local_now;
use pdv_core::validation::validate_non_negative;
use pdv_core::{
    CashClosingSummary, CashMovement, CashRegister, Money, MovementKind, RegisterState,
};

#[derive(sqlx::FromRow)]
struct RegisterRow {
    id: i64,
    opening_balance: f64,
    current_balance: f64,
    updated_at: Option<NaiveDateTime>,
    state: RegisterState,
    opened_at: Option<NaiveDateTime>,
}

impl From<RegisterRow> for CashRegister {
    fn from(row: RegisterRow) -> Self {
        CashRegister {
            id: row.id,
            opening_balance: Money::from_real(row.opening_balance),
            current_balance: Money::from_real(row.current_balance),
            updated_at: row.updated_at,
            state: row.state,
            opened_at: row.opened_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: i64,
    recorded_at: Option<NaiveDateTime>,
    kind: String,
    description: String,
    amount: f64,
}

impl From<MovementRow> for CashMovement {
    fn from(row: MovementRow) -> Self {
        CashMovement {
            id: row.id,
            recorded_at: row.recorded_at,
            kind: MovementKind::parse(&row.kind),
            description: row.description,
            amount: Money::from_real(row.amount),
        }
    }
}

/// Loads the active register, creating a closed one when the table is empty.
async fn active_register(conn: &mut SqliteConnection) -> DbResult<CashRegister> {
    const SELECT_ACTIVE: &str = r#"
        SELECT
            id,
            COALESCE(saldo_inicial, 0.0) AS opening_balance,
            COALESCE(saldo_atual, 0.0) AS current_balance,
            ultima_atualizacao AS updated_at,
            COALESCE(status, 'fechado') AS state,
            aberto_em AS opened_at
        FROM caixa
        ORDER BY id
        LIMIT 1
    "#;

    let existing: Option<RegisterRow> = sqlx::query_as(SELECT_ACTIVE)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = existing {
        return Ok(row.into());
    }

    debug!("No cash register row, creating one");
    sqlx::query(
        "INSERT INTO caixa (saldo_inicial, saldo_atual, ultima_atualizacao, status) VALUES (0, 0, ?, ?)",
    )
    .bind(local_now())
    .bind(RegisterState::Closed)
    .execute(&mut *conn)
    .await?;

    let row: RegisterRow = sqlx::query_as(SELECT_ACTIVE).fetch_one(&mut *conn).await?;
    Ok(row.into())
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    recorded_at: NaiveDateTime,
    kind: &MovementKind,
    description: &str,
    amount: Money,
) -> DbResult<i64> {
    let result = sqlx::query(
        "INSERT INTO movimentos_caixa (data, tipo, descricao, valor) VALUES (?, ?, ?, ?)",
    )
    .bind(recorded_at)
    .bind(kind.as_str())
    .bind(description)
    .bind(amount.to_real())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Repository for the cash register.
///
/// ## Usage
/// ```rust,ignore
/// let cash = db.cash();
///
/// cash.open(Money::from_cents(10000)).await?;
/// cash.record_movement(MovementKind::Inflow, "Troco extra", Money::from_cents(5000)).await?;
/// let summary = cash.close(Some("op1"), None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    /// Creates a new CashRegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    /// The active register.
    pub async fn current(&self) -> DbResult<CashRegister> {
        let mut conn = self.pool.acquire().await?;
        active_register(&mut *conn).await
    }

    /// Stored register state.
    pub async fn status(&self) -> DbResult<RegisterState> {
        Ok(self.current().await?.state)
    }

    /// Starts a new session with `initial_amount` in the drawer.
    ///
    /// Allowed in either state. The previous ledger is discarded.
    pub async fn open(&self, initial_amount: Money) -> DbResult<CashRegister> {
        validate_non_negative("initial amount", initial_amount)?;

        let mut tx = self.pool.begin().await?;
        let register = active_register(&mut *tx).await?;
        let now = local_now();

        sqlx::query(
            r#"
            UPDATE caixa SET
                saldo_inicial = ?,
                saldo_atual = ?,
                status = ?,
                aberto_em = ?,
                ultima_atualizacao = ?
            WHERE id = ?
            "#,
        )
        .bind(initial_amount.to_real())
        .bind(initial_amount.to_real())
        .bind(RegisterState::Open)
        .bind(now)
        .bind(now)
        .bind(register.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM movimentos_caixa")
            .execute(&mut *tx)
            .await?;

        insert_movement(
            &mut *tx,
            now,
            &MovementKind::Opening,
            OPENING_DESCRIPTION,
            initial_amount,
        )
        .await?;

        tx.commit().await?;

        info!(register_id = register.id, amount = %initial_amount, "Cash register opened");

        Ok(CashRegister {
            opening_balance: initial_amount,
            current_balance: initial_amount,
            updated_at: Some(now),
            state: RegisterState::Open,
            opened_at: Some(now),
            ..register
        })
    }

    /// Ends the session and returns its summary.
    ///
    /// `final_amount` is the amount the operator counted; without it the
    /// current balance is taken as counted. Closing a register that is
    /// already closed still appends the closing row and resets the balances;
    /// its summary covers what was recorded after the previous closing row.
    pub async fn close(
        &self,
        operator: Option<&str>,
        final_amount: Option<Money>,
    ) -> DbResult<CashClosingSummary> {
        if let Some(amount) = final_amount {
            validate_non_negative("final amount", amount)?;
        }

        let mut tx = self.pool.begin().await?;
        let register = active_register(&mut *tx).await?;

        let session: Vec<(String, f64)> = if register.state.is_open() {
            sqlx::query_as(
                r#"
                SELECT tipo, COALESCE(valor, 0.0)
                FROM movimentos_caixa
                WHERE ? IS NULL OR data >= ?
                ORDER BY id
                "#,
            )
            .bind(register.opened_at)
            .bind(register.opened_at)
            .fetch_all(&mut *tx)
            .await?
        } else {
            debug!(register_id = register.id, "Closing a register that is not open");
            sqlx::query_as(
                r#"
                SELECT tipo, COALESCE(valor, 0.0)
                FROM movimentos_caixa
                WHERE id > (
                    SELECT COALESCE(MAX(id), 0) FROM movimentos_caixa
                    WHERE LOWER(tipo) IN ('abertura', 'fechamento')
                )
                ORDER BY id
                "#,
            )
            .fetch_all(&mut *tx)
            .await?
        };

        let session: Vec<(MovementKind, Money)> = session
            .into_iter()
            .map(|(kind, amount)| (MovementKind::parse(&kind), Money::from_real(amount)))
            .collect();

        let closed_at = local_now();
        let summary = CashClosingSummary::from_session(
            closed_at,
            register.opening_balance,
            register.current_balance,
            final_amount,
            session.iter().map(|(kind, amount)| (kind, *amount)),
        );

        insert_movement(
            &mut *tx,
            closed_at,
            &MovementKind::Closing,
            &closing_description(operator),
            summary.declared_amount,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE caixa SET
                saldo_inicial = 0,
                saldo_atual = 0,
                status = ?,
                aberto_em = NULL,
                ultima_atualizacao = ?
            WHERE id = ?
            "#,
        )
        .bind(RegisterState::Closed)
        .bind(closed_at)
        .bind(register.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            register_id = register.id,
            final_balance = %summary.final_balance,
            difference = %summary.difference,
            "Cash register closed"
        );

        Ok(summary)
    }

    /// Appends a movement and moves the balance accordingly, whatever the
    /// stored register state.
    ///
    /// ## Returns
    /// * `Ok(id)` - The new movement id
    /// * `Err(DbError::InvalidState)` - `abertura` or `fechamento` kind
    /// * `Err(DbError::Validation)` - Amount not positive
    pub async fn record_movement(
        &self,
        kind: MovementKind,
        description: &str,
        amount: Money,
    ) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let register = active_register(&mut *tx).await?;
        ensure_can_record(&kind, amount)?;

        let now = local_now();
        let id = insert_movement(&mut *tx, now, &kind, description.trim(), amount).await?;
        let balance = apply_movement(register.current_balance, &kind, amount);

        sqlx::query("UPDATE caixa SET saldo_atual = ?, ultima_atualizacao = ? WHERE id = ?")
            .bind(balance.to_real())
            .bind(now)
            .bind(register.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(movement_id = id, kind = %kind, amount = %amount, balance = %balance, "Cash movement recorded");
        Ok(id)
    }

    /// Ledger entries, newest first. `None` returns all of them.
    pub async fn movements(&self, limit: Option<u32>) -> DbResult<Vec<CashMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT
                id,
                data AS recorded_at,
                COALESCE(tipo, '') AS kind,
                COALESCE(descricao, '') AS description,
                COALESCE(valor, 0.0) AS amount
            FROM movimentos_caixa
            ORDER BY data DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CashMovement::from).collect())
    }

    /// Deletes the ledger and leaves the register closed with zero balances.
    pub async fn clear_cash_flow(&self) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let register = active_register(&mut *tx).await?;

        sqlx::query("DELETE FROM movimentos_caixa")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE caixa SET
                saldo_inicial = 0,
                saldo_atual = 0,
                status = ?,
                aberto_em = NULL,
                ultima_atualizacao = ?
            WHERE id = ?
            "#,
        )
        .bind(RegisterState::Closed)
        .bind(local_now())
        .bind(register.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(register_id = register.id, "Cash flow cleared");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn reais(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    #[tokio::test]
    async fn test_fresh_register_is_closed() {
        let db = setup().await;
        let register = db.cash().current().await.unwrap();
        assert_eq!(register.state, RegisterState::Closed);
        assert!(register.current_balance.is_zero());
        assert_eq!(db.cash().status().await.unwrap(), RegisterState::Closed);
    }

    #[tokio::test]
    async fn test_register_row_is_recreated() {
        let db = setup().await;
        sqlx::query("DELETE FROM caixa").execute(db.pool()).await.unwrap();

        let register = db.cash().current().await.unwrap();
        assert_eq!(register.state, RegisterState::Closed);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM caixa")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_open_resets_ledger() {
        let db = setup().await;
        let cash = db.cash();

        cash.open(reais(5000)).await.unwrap();
        cash.record_movement(MovementKind::Inflow, "Reforço", reais(2000))
            .await
            .unwrap();

        let register = cash.open(reais(10000)).await.unwrap();
        assert_eq!(register.state, RegisterState::Open);
        assert_eq!(register.current_balance, reais(10000));
        assert!(register.opened_at.is_some());

        let ledger = cash.movements(None).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, MovementKind::Opening);
        assert_eq!(ledger[0].description, OPENING_DESCRIPTION);
        assert_eq!(ledger[0].amount, reais(10000));

        assert_eq!(cash.current().await.unwrap().current_balance, reais(10000));
    }

    #[tokio::test]
    async fn test_open_rejects_negative_amount() {
        let db = setup().await;
        let result = db.cash().open(reais(-1)).await;
        assert!(matches!(result, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_session_scenario() {
        let db = setup().await;
        let cash = db.cash();

        cash.open(reais(10000)).await.unwrap();
        cash.record_movement(MovementKind::Inflow, "Suprimento", reais(5000))
            .await
            .unwrap();
        cash.record_movement(MovementKind::Outflow, "Sangria", reais(500))
            .await
            .unwrap();
        assert_eq!(cash.current().await.unwrap().current_balance, reais(14500));

        let summary = cash.close(Some("op1"), None).await.unwrap();
        assert_eq!(summary.opening_balance, reais(10000));
        assert_eq!(summary.total_entries, reais(5000));
        assert_eq!(summary.total_exits, reais(500));
        assert_eq!(summary.final_balance, reais(14500));
        assert_eq!(summary.declared_amount, reais(14500));
        assert!(summary.difference.is_zero());

        let register = cash.current().await.unwrap();
        assert_eq!(register.state, RegisterState::Closed);
        assert!(register.current_balance.is_zero());
        assert!(register.opening_balance.is_zero());

        let ledger = cash.movements(Some(1)).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, MovementKind::Closing);
        assert_eq!(ledger[0].description, "Fechamento de caixa - Operador: op1");
    }

    #[tokio::test]
    async fn test_close_with_counted_amount() {
        let db = setup().await;
        let cash = db.cash();

        cash.open(reais(10000)).await.unwrap();
        cash.record_movement(MovementKind::Sale, "Venda V1", reais(4990))
            .await
            .unwrap();

        let summary = cash.close(None, Some(reais(14000))).await.unwrap();
        assert_eq!(summary.final_balance, reais(14990));
        assert_eq!(summary.declared_amount, reais(14000));
        assert_eq!(summary.difference, reais(-990));

        let last = cash.movements(Some(1)).await.unwrap();
        assert_eq!(last[0].description, "Fechamento de caixa - Operador: sistema");
    }

    #[tokio::test]
    async fn test_record_movement_on_closed_register() {
        let db = setup().await;
        let cash = db.cash();

        cash.record_movement(MovementKind::Inflow, "Venda #1", reais(5000))
            .await
            .unwrap();
        cash.record_movement(MovementKind::Outflow, "Troco", reais(500))
            .await
            .unwrap();

        let register = cash.current().await.unwrap();
        assert_eq!(register.state, RegisterState::Closed);
        assert_eq!(register.current_balance, reais(4500));
        assert_eq!(cash.movements(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_close_closed_register() {
        let db = setup().await;
        let cash = db.cash();

        let summary = cash.close(Some("op1"), None).await.unwrap();
        assert!(summary.opening_balance.is_zero());
        assert!(summary.total_entries.is_zero());
        assert!(summary.total_exits.is_zero());
        assert!(summary.final_balance.is_zero());
        assert!(summary.difference.is_zero());

        // a second close after a real session sees nothing of the old one
        cash.open(reais(10000)).await.unwrap();
        cash.record_movement(MovementKind::Inflow, "Suprimento", reais(2000))
            .await
            .unwrap();
        cash.close(None, None).await.unwrap();
        let again = cash.close(None, None).await.unwrap();
        assert!(again.total_entries.is_zero());
        assert!(again.final_balance.is_zero());

        let register = cash.current().await.unwrap();
        assert_eq!(register.state, RegisterState::Closed);
        assert!(register.current_balance.is_zero());
        assert!(register.opened_at.is_none());

        let ledger = cash.movements(None).await.unwrap();
        assert_eq!(
            ledger.iter().filter(|m| m.kind == MovementKind::Closing).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_close_after_recording_while_closed() {
        let db = setup().await;
        let cash = db.cash();

        cash.open(reais(10000)).await.unwrap();
        cash.close(None, None).await.unwrap();
        cash.record_movement(MovementKind::Inflow, "Venda #1", reais(5000))
            .await
            .unwrap();
        cash.record_movement(MovementKind::Outflow, "Troco", reais(500))
            .await
            .unwrap();

        let summary = cash.close(Some("op1"), None).await.unwrap();
        assert!(summary.opening_balance.is_zero());
        assert_eq!(summary.total_entries, reais(5000));
        assert_eq!(summary.total_exits, reais(500));
        assert_eq!(summary.final_balance, reais(4500));
        assert_eq!(
            summary.total_entries - summary.total_exits + summary.opening_balance,
            summary.final_balance
        );
        assert!(cash.current().await.unwrap().current_balance.is_zero());
    }

    #[tokio::test]
    async fn test_record_movement_checks() {
        let db = setup().await;
        let cash = db.cash();
        cash.open(reais(1000)).await.unwrap();

        let reserved = cash
            .record_movement(MovementKind::Opening, "x", reais(100))
            .await;
        assert!(matches!(reserved, Err(DbError::InvalidState(_))));
        let reserved = cash
            .record_movement(MovementKind::Closing, "x", reais(100))
            .await;
        assert!(matches!(reserved, Err(DbError::InvalidState(_))));

        let zero = cash.record_movement(MovementKind::Inflow, "x", reais(0)).await;
        assert!(matches!(zero, Err(DbError::Validation(_))));

        let other = MovementKind::parse("sangria");
        cash.record_movement(other, "Retirada", reais(300)).await.unwrap();
        assert_eq!(cash.current().await.unwrap().current_balance, reais(700));
    }

    #[tokio::test]
    async fn test_clear_cash_flow() {
        let db = setup().await;
        let cash = db.cash();

        cash.open(reais(1000)).await.unwrap();
        cash.clear_cash_flow().await.unwrap();

        let register = cash.current().await.unwrap();
        assert_eq!(register.state, RegisterState::Closed);
        assert!(register.current_balance.is_zero());
        assert!(register.opened_at.is_none());
        assert!(cash.movements(None).await.unwrap().is_empty());
    }
}
