//! # Sale Repository
//!
//! Records sales and reads them back.
//!
//! ## Registering a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       register_sale(cart, options)                      │
//! │                                                                         │
//! │  1. RESOLVE (pdv-core, no I/O)                                          │
//! │     └── Cart::resolve() → totals, change, code (V + uuid)               │
//! │                                                                         │
//! │  2. BEGIN                                                               │
//! │     └── INSERT vendas                     → sale_id                     │
//! │                                                                         │
//! │  3. FOR EACH LINE                                                       │
//! │     ├── SELECT id FROM produtos WHERE codigo = ?                        │
//! │     │     └── missing? warn! + skipped_codes, next line                 │
//! │     ├── INSERT itens_venda                                              │
//! │     ├── UPDATE produtos SET quantidade = quantidade - n                 │
//! │     └── INSERT movimentacoes_estoque ('venda', -n, code)                │
//! │                                                                         │
//! │  4. COMMIT (any error above drops the transaction: nothing is written)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use pdv_core::types::{local_now, STOCK_MOVEMENT_SALE};
use pdv_core::{
    Cart, DateRange, Money, PaymentMethod, RecordedSale, Sale, SaleItem, SaleOptions,
    SaleWithItems,
};

/// Column list shared by sale header queries.
pub(crate) const SALE_COLUMNS: &str = r#"
    vendas.id AS id,
    vendas.usuario_id AS operator_id,
    COALESCE(vendas.valor_total, 0.0) AS total,
    COALESCE(vendas.forma_pagamento, '') AS payment_method,
    COALESCE(vendas.desconto, 0.0) AS discount,
    vendas.data_venda AS sold_at,
    vendas.codigo AS code,
    COALESCE(vendas.valor_recebido, 0.0) AS amount_received,
    COALESCE(vendas.troco, 0.0) AS change_given
"#;

/// Inclusive filter on `vendas.data_venda`. Binds: start, start, end, end.
pub(crate) const SALE_RANGE_FILTER: &str =
    "(? IS NULL OR vendas.data_venda >= ?) AND (? IS NULL OR vendas.data_venda <= ?)";

#[derive(sqlx::FromRow)]
pub(crate) struct SaleRow {
    id: i64,
    operator_id: Option<i64>,
    total: f64,
    payment_method: String,
    discount: f64,
    sold_at: Option<NaiveDateTime>,
    code: Option<String>,
    amount_received: f64,
    change_given: f64,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            operator_id: row.operator_id,
            total: Money::from_real(row.total),
            payment_method: PaymentMethod::parse(&row.payment_method),
            discount: Money::from_real(row.discount),
            sold_at: row.sold_at,
            code: row.code,
            amount_received: Money::from_real(row.amount_received),
            change: Money::from_real(row.change_given),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SaleItemRow {
    id: i64,
    sale_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: f64,
    subtotal: f64,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: Money::from_real(row.unit_price),
            subtotal: Money::from_real(row.subtotal),
        }
    }
}

const SALE_ITEM_COLUMNS: &str = r#"
    itens_venda.id AS id,
    itens_venda.venda_id AS sale_id,
    itens_venda.produto_id AS product_id,
    itens_venda.quantidade AS quantity,
    COALESCE(itens_venda.preco_unitario, 0.0) AS unit_price,
    COALESCE(itens_venda.subtotal, 0.0) AS subtotal
"#;

/// Generates a sale code: `V` followed by 32 lowercase hex digits.
pub fn new_sale_code() -> String {
    format!("V{}", Uuid::new_v4().simple())
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a sale with its lines and stock effects in one transaction.
    ///
    /// Lines whose product code matches nothing are skipped and listed in
    /// `skipped_codes`. Stock is decremented without a floor.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let cart = Cart::Items(vec![CartLine::new("CAM-001", 2, Money::from_cents(4990))]);
    /// let recorded = db.sales().register_sale(cart, SaleOptions::default()).await?;
    /// println!("{} {}", recorded.code, recorded.total);
    /// ```
    pub async fn register_sale(&self, cart: Cart, options: SaleOptions) -> DbResult<RecordedSale> {
        let sale = cart.resolve(options, new_sale_code)?;
        let sold_at = local_now();

        debug!(code = %sale.code, lines = sale.lines.len(), total = %sale.total, "Registering sale");

        let mut tx = self.pool.begin().await?;

        let sale_id = sqlx::query(
            r#"
            INSERT INTO vendas (
                usuario_id, valor_total, forma_pagamento, desconto,
                data_venda, codigo, valor_recebido, troco
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sale.operator_id)
        .bind(sale.total.to_real())
        .bind(sale.payment_method.as_str())
        .bind(sale.discount.to_real())
        .bind(sold_at)
        .bind(&sale.code)
        .bind(sale.amount_received.to_real())
        .bind(sale.change.to_real())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut items_recorded = 0;
        let mut skipped_codes = Vec::new();

        for line in &sale.lines {
            let product_id: Option<i64> =
                sqlx::query_scalar("SELECT id FROM produtos WHERE codigo = ?")
                    .bind(line.code.trim())
                    .fetch_optional(&mut *tx)
                    .await?;

            let Some(product_id) = product_id else {
                warn!(sale_id, code = %line.code, "Unknown product code, line skipped");
                skipped_codes.push(line.code.clone());
                continue;
            };

            sqlx::query(
                r#"
                INSERT INTO itens_venda (venda_id, produto_id, quantidade, preco_unitario, subtotal)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(sale_id)
            .bind(product_id)
            .bind(line.quantity)
            .bind(line.unit_price.to_real())
            .bind(line.subtotal().to_real())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE produtos SET quantidade = quantidade - ?, updated_at = ? WHERE id = ?",
            )
            .bind(line.quantity)
            .bind(sold_at)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO movimentacoes_estoque
                    (produto_id, quantidade, tipo_movimento, referencia, data_movimento)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(product_id)
            .bind(-line.quantity)
            .bind(STOCK_MOVEMENT_SALE)
            .bind(&sale.code)
            .bind(sold_at)
            .execute(&mut *tx)
            .await?;

            items_recorded += 1;
        }

        tx.commit().await?;

        info!(
            sale_id,
            code = %sale.code,
            total = %sale.total,
            items_recorded,
            skipped = skipped_codes.len(),
            "Sale recorded"
        );

        Ok(RecordedSale {
            sale_id,
            code: sale.code,
            total: sale.total,
            items_recorded,
            skipped_codes,
        })
    }

    /// Gets a sale header by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> =
            sqlx::query_as(&format!("SELECT {} FROM vendas WHERE vendas.id = ?", SALE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Sale::from))
    }

    /// Gets the lines of a sale.
    pub async fn items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let rows: Vec<SaleItemRow> = sqlx::query_as(&format!(
            "SELECT {} FROM itens_venda WHERE itens_venda.venda_id = ? ORDER BY itens_venda.id",
            SALE_ITEM_COLUMNS
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleItem::from).collect())
    }

    /// Sales inside `range` with their lines, newest first.
    pub async fn list_with_items(&self, range: &DateRange) -> DbResult<Vec<SaleWithItems>> {
        let sales: Vec<SaleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vendas WHERE {} ORDER BY vendas.data_venda DESC, vendas.id DESC",
            SALE_COLUMNS, SALE_RANGE_FILTER
        ))
        .bind(range.start)
        .bind(range.start)
        .bind(range.end)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<SaleItemRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM itens_venda
            JOIN vendas ON vendas.id = itens_venda.venda_id
            WHERE {}
            ORDER BY itens_venda.id
            "#,
            SALE_ITEM_COLUMNS, SALE_RANGE_FILTER
        ))
        .bind(range.start)
        .bind(range.start)
        .bind(range.end)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        let mut by_sale: HashMap<i64, Vec<SaleItem>> = HashMap::new();
        for item in items {
            by_sale.entry(item.sale_id).or_default().push(item.into());
        }

        Ok(sales
            .into_iter()
            .map(|row| {
                let sale = Sale::from(row);
                let items = by_sale.remove(&sale.id).unwrap_or_default();
                SaleWithItems { sale, items }
            })
            .collect())
    }

    /// Counts sales (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vendas")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
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
    use pdv_core::{CartLine, Checkout, ProductDraft};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (code, name, price, qty) in [
            ("CAM-001", "Camiseta", 4990, 10),
            ("CAL-010", "Calça", 12000, 3),
            ("BON-002", "Boné", 2500, 1),
        ] {
            db.products()
                .create(&ProductDraft {
                    code: code.to_string(),
                    name: name.to_string(),
                    price: Money::from_cents(price),
                    quantity: qty,
                    ..ProductDraft::default()
                })
                .await
                .unwrap();
        }
        db
    }

    async fn stock(db: &Database, code: &str) -> i64 {
        db.products().get_by_code(code).await.unwrap().unwrap().quantity
    }

    #[test]
    fn test_sale_code_format() {
        let code = new_sale_code();
        assert_eq!(code.len(), 33);
        assert!(code.starts_with('V'));
        assert!(code[1..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(code, new_sale_code());
    }

    #[tokio::test]
    async fn test_register_sale_items() {
        let db = setup().await;
        let cart = Cart::Items(vec![
            CartLine::new("CAM-001", 2, Money::from_cents(4990)),
            CartLine::new("CAL-010", 1, Money::from_cents(12000)),
        ]);
        let options = SaleOptions {
            discount: Money::from_cents(980),
            amount_received: Money::from_cents(25000),
            ..SaleOptions::default()
        };

        let recorded = db.sales().register_sale(cart, options).await.unwrap();
        assert_eq!(recorded.items_recorded, 2);
        assert!(recorded.skipped_codes.is_empty());
        assert_eq!(recorded.total.cents(), 21000);

        let sale = db.sales().get_by_id(recorded.sale_id).await.unwrap().unwrap();
        assert_eq!(sale.code.as_deref(), Some(recorded.code.as_str()));
        assert_eq!(sale.payment_method, PaymentMethod::Cash);
        assert_eq!(sale.discount.cents(), 980);
        assert_eq!(sale.change.cents(), 4000);
        assert!(sale.sold_at.is_some());

        let items = db.sales().items(recorded.sale_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].subtotal.cents(), 9980);

        assert_eq!(stock(&db, "CAM-001").await, 8);
        assert_eq!(stock(&db, "CAL-010").await, 2);

        let product = db.products().get_by_code("CAM-001").await.unwrap().unwrap();
        let trail = db.products().stock_movements(product.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, STOCK_MOVEMENT_SALE);
        assert_eq!(trail[0].quantity, -2);
        assert_eq!(trail[0].reference.as_deref(), Some(recorded.code.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_code_is_skipped() {
        let db = setup().await;
        let cart = Cart::Items(vec![
            CartLine::new("CAM-001", 1, Money::from_cents(4990)),
            CartLine::new("GHOST", 4, Money::from_cents(100)),
            CartLine::new("BON-002", 1, Money::from_cents(2500)),
        ]);

        let recorded = db.sales().register_sale(cart, SaleOptions::default()).await.unwrap();
        assert_eq!(recorded.items_recorded, 2);
        assert_eq!(recorded.skipped_codes, vec!["GHOST".to_string()]);
        assert_eq!(db.sales().items(recorded.sale_id).await.unwrap().len(), 2);
        assert_eq!(stock(&db, "CAM-001").await, 9);
    }

    #[tokio::test]
    async fn test_stock_may_go_negative() {
        let db = setup().await;
        let cart = Cart::Items(vec![CartLine::new("BON-002", 3, Money::from_cents(2500))]);

        db.sales().register_sale(cart, SaleOptions::default()).await.unwrap();
        assert_eq!(stock(&db, "BON-002").await, -2);
    }

    #[tokio::test]
    async fn test_checkout_values_win() {
        let db = setup().await;
        let cart = Cart::Checkout(Checkout {
            code: Some("PDV-42".to_string()),
            total: Some(Money::from_cents(4500)),
            payment_method: Some(PaymentMethod::Pix),
            items: vec![CartLine::new("CAM-001", 1, Money::from_cents(4990))],
            ..Checkout::default()
        });
        let options = SaleOptions {
            payment_method: PaymentMethod::CreditCard,
            ..SaleOptions::default()
        };

        let recorded = db.sales().register_sale(cart, options).await.unwrap();
        assert_eq!(recorded.code, "PDV-42");
        assert_eq!(recorded.total.cents(), 4500);

        let sale = db.sales().get_by_id(recorded.sale_id).await.unwrap().unwrap();
        assert_eq!(sale.payment_method, PaymentMethod::Pix);
    }

    #[tokio::test]
    async fn test_invalid_line_records_nothing() {
        let db = setup().await;
        let cart = Cart::Items(vec![
            CartLine::new("CAM-001", 1, Money::from_cents(4990)),
            CartLine::new("CAL-010", 0, Money::from_cents(12000)),
        ]);

        let result = db.sales().register_sale(cart, SaleOptions::default()).await;
        assert!(matches!(result, Err(DbError::Validation(_))));
        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(stock(&db, "CAM-001").await, 10);
    }

    #[tokio::test]
    async fn test_failed_sale_rolls_back() {
        let db = setup().await;
        let cart = Cart::Items(vec![CartLine::new("CAM-001", 1, Money::from_cents(4990))]);
        let options = SaleOptions {
            operator_id: 999,
            ..SaleOptions::default()
        };

        let result = db.sales().register_sale(cart, options).await;
        assert!(matches!(result, Err(DbError::ForeignKeyViolation { .. })));
        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(stock(&db, "CAM-001").await, 10);
    }

    #[tokio::test]
    async fn test_list_with_items() {
        let db = setup().await;
        let first = db
            .sales()
            .register_sale(
                Cart::Items(vec![CartLine::new("CAM-001", 1, Money::from_cents(4990))]),
                SaleOptions::default(),
            )
            .await
            .unwrap();
        let second = db
            .sales()
            .register_sale(
                Cart::Items(vec![
                    CartLine::new("CAL-010", 1, Money::from_cents(12000)),
                    CartLine::new("BON-002", 1, Money::from_cents(2500)),
                ]),
                SaleOptions::default(),
            )
            .await
            .unwrap();

        let all = db.sales().list_with_items(&DateRange::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sale.id, second.sale_id);
        assert_eq!(all[0].items.len(), 2);
        assert_eq!(all[1].sale.id, first.sale_id);
        assert_eq!(all[1].items.len(), 1);

        let past = DateRange::parse(Some("2000-01-01"), Some("2000-12-31")).unwrap();
        assert!(db.sales().list_with_items(&past).await.unwrap().is_empty());
    }
}
