//! # Report Repository
//!
//! Read-only aggregates over sales and stock.
//!
//! All ranges are inclusive on `vendas.data_venda`; see `DateRange::parse`
//! for how date-only bounds are widened.

use sqlx::SqlitePool;
use tracing::debug;

use super::product::{ProductRow, PRODUCT_COLUMNS};
use super::sale::{SaleRow, SALE_COLUMNS, SALE_RANGE_FILTER};
use crate::error::DbResult;
use pdv_core::{DateRange, Money, Product, Sale, SalesSummary, TopProduct};

#[derive(sqlx::FromRow)]
struct TopProductRow {
    product_id: i64,
    name: Option<String>,
    category: Option<String>,
    quantity_sold: i64,
    revenue: f64,
}

impl From<TopProductRow> for TopProduct {
    fn from(row: TopProductRow) -> Self {
        TopProduct {
            product_id: row.product_id,
            name: row.name,
            category: row.category,
            quantity_sold: row.quantity_sold,
            revenue: Money::from_real(row.revenue),
        }
    }
}

/// Repository for reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Sale headers inside `range`, newest first.
    pub async fn sales_in_range(&self, range: &DateRange) -> DbResult<Vec<Sale>> {
        debug!(start = ?range.start, end = ?range.end, "Sales report");

        let rows: Vec<SaleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM vendas WHERE {} ORDER BY vendas.data_venda DESC, vendas.id DESC",
            SALE_COLUMNS, SALE_RANGE_FILTER
        ))
        .bind(range.start)
        .bind(range.start)
        .bind(range.end)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Sale::from).collect())
    }

    /// Best sellers inside `range`, by revenue.
    ///
    /// Products deleted since the sale still appear, without a name.
    pub async fn top_products(&self, range: &DateRange, limit: u32) -> DbResult<Vec<TopProduct>> {
        let rows: Vec<TopProductRow> = sqlx::query_as(&format!(
            r#"
            SELECT
                itens_venda.produto_id AS product_id,
                produtos.nome AS name,
                NULLIF(produtos.categoria, '') AS category,
                CAST(TOTAL(itens_venda.quantidade) AS INTEGER) AS quantity_sold,
                TOTAL(itens_venda.subtotal) AS revenue
            FROM itens_venda
            JOIN vendas ON vendas.id = itens_venda.venda_id
            LEFT JOIN produtos ON produtos.id = itens_venda.produto_id
            WHERE {}
            GROUP BY itens_venda.produto_id
            ORDER BY revenue DESC, quantity_sold DESC
            LIMIT ?
            "#,
            SALE_RANGE_FILTER
        ))
        .bind(range.start)
        .bind(range.start)
        .bind(range.end)
        .bind(range.end)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TopProduct::from).collect())
    }

    /// Products at or below their minimum, emptiest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM produtos
            WHERE COALESCE(quantidade, 0) <= COALESCE(min_quantidade, 0)
            ORDER BY quantidade, nome
            "#,
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Count, revenue and average ticket of the sales inside `range`.
    pub async fn sales_summary(&self, range: &DateRange) -> DbResult<SalesSummary> {
        let (count, revenue): (i64, f64) = sqlx::query_as(&format!(
            "SELECT COUNT(*), TOTAL(vendas.valor_total) FROM vendas WHERE {}",
            SALE_RANGE_FILTER
        ))
        .bind(range.start)
        .bind(range.start)
        .bind(range.end)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesSummary::new(count, Money::from_real(revenue)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
