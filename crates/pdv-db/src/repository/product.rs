//! # Product Repository
//!
//! Database operations for products and their stock trail.
//!
//! ## Key Operations
//! - CRUD keyed by id, lookups by the unique product code
//! - Category listing
//! - Manual stock adjustment (clamped at zero, audited)
//!
//! ## Stock Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Sale (SaleRepository)          Manual adjustment (this repository)     │
//! │  ─────────────────────          ───────────────────────────────────     │
//! │  quantidade = quantidade - n    quantidade = MAX(quantidade + d, 0)     │
//! │  no floor: stock may go < 0     clamped at zero                         │
//! │  movement 'venda', ref = code   movement 'ajuste', applied delta        │
//! │                                                                         │
//! │  Both append to movimentacoes_estoque                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use pdv_core::types::{local_now, STOCK_MOVEMENT_ADJUSTMENT};
use pdv_core::validation::{
    validate_price, validate_product_code, validate_product_name, validate_stock_level,
};
use pdv_core::{Money, Product, ProductDraft, StockMovement};

/// Column list shared by every product query. Legacy rows may hold NULL or
/// empty strings in the descriptive columns.
pub(crate) const PRODUCT_COLUMNS: &str = r#"
    id,
    COALESCE(codigo, '') AS code,
    COALESCE(nome, '') AS name,
    NULLIF(descricao, '') AS description,
    COALESCE(preco, 0.0) AS price,
    COALESCE(quantidade, 0) AS quantity,
    COALESCE(min_quantidade, 0) AS min_quantity,
    NULLIF(categoria, '') AS category,
    NULLIF(marca, '') AS brand,
    NULLIF(tamanho, '') AS size,
    NULLIF(cor, '') AS color,
    NULLIF(imagem, '') AS image,
    created_at,
    updated_at
"#;

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: i64,
    code: String,
    name: String,
    description: Option<String>,
    price: f64,
    quantity: i64,
    min_quantity: i64,
    category: Option<String>,
    brand: Option<String>,
    size: Option<String>,
    color: Option<String>,
    image: Option<String>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            price: Money::from_real(row.price),
            quantity: row.quantity,
            min_quantity: row.min_quantity,
            category: row.category,
            brand: row.brand,
            size: row.size,
            color: row.color,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StockMovementRow {
    id: i64,
    product_id: i64,
    quantity: i64,
    kind: String,
    reference: Option<String>,
    moved_at: Option<NaiveDateTime>,
}

impl From<StockMovementRow> for StockMovement {
    fn from(row: StockMovementRow) -> Self {
        StockMovement {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            kind: row.kind,
            reference: row.reference,
            moved_at: row.moved_at,
        }
    }
}

/// Reference written on manual adjustments.
const ADJUSTMENT_REFERENCE: &str = "Ajuste manual";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let id = repo.create(&draft).await?;
/// let product = repo.get_by_code("CAM-001").await?;
/// repo.adjust_stock("CAM-001", 12).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists every product, sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM produtos ORDER BY nome", PRODUCT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Gets a product by its id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM produtos WHERE id = ?", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Gets a product by its code.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - No product carries this code
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM produtos WHERE codigo = ?", PRODUCT_COLUMNS))
                .bind(code.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Lists the products of one category, sorted by name.
    pub async fn list_by_category(&self, category: &str) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM produtos WHERE categoria = ? ORDER BY nome",
            PRODUCT_COLUMNS
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Distinct non-empty categories, sorted.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let categories = sqlx::query_scalar(
            r#"
            SELECT DISTINCT categoria
            FROM produtos
            WHERE categoria IS NOT NULL AND categoria <> ''
            ORDER BY categoria
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Inserts a new product and returns its id.
    ///
    /// ## Returns
    /// * `Ok(id)` - Product created
    /// * `Err(DbError::UniqueViolation)` - Code already in use
    /// * `Err(DbError::Validation)` - Draft rejected
    pub async fn create(&self, draft: &ProductDraft) -> DbResult<i64> {
        validate_draft(draft)?;
        let code = draft.code.trim();

        debug!(code = %code, "Inserting product");

        if self.code_owner(code).await?.is_some() {
            return Err(DbError::duplicate("code", code));
        }

        let now = local_now();
        let result = sqlx::query(
            r#"
            INSERT INTO produtos (
                codigo, nome, descricao, preco, quantidade, min_quantidade,
                categoria, marca, tamanho, cor, imagem, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(code)
        .bind(draft.name.trim())
        .bind(&draft.description)
        .bind(draft.price.to_real())
        .bind(draft.quantity)
        .bind(draft.min_quantity)
        .bind(&draft.category)
        .bind(&draft.brand)
        .bind(&draft.size)
        .bind(&draft.color)
        .bind(&draft.image)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(product_id = id, code = %code, "Product created");
        Ok(id)
    }

    /// Updates every field of an existing product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    /// * `Err(DbError::UniqueViolation)` - New code belongs to another product
    pub async fn update(&self, id: i64, draft: &ProductDraft) -> DbResult<()> {
        validate_draft(draft)?;
        let code = draft.code.trim();

        debug!(product_id = id, "Updating product");

        if matches!(self.code_owner(code).await?, Some(owner) if owner != id) {
            return Err(DbError::duplicate("code", code));
        }

        let result = sqlx::query(
            r#"
            UPDATE produtos SET
                codigo = ?,
                nome = ?,
                descricao = ?,
                preco = ?,
                quantidade = ?,
                min_quantidade = ?,
                categoria = ?,
                marca = ?,
                tamanho = ?,
                cor = ?,
                imagem = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(code)
        .bind(draft.name.trim())
        .bind(&draft.description)
        .bind(draft.price.to_real())
        .bind(draft.quantity)
        .bind(draft.min_quantity)
        .bind(&draft.category)
        .bind(&draft.brand)
        .bind(&draft.size)
        .bind(&draft.color)
        .bind(&draft.image)
        .bind(local_now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id.to_string()));
        }

        Ok(())
    }

    /// Deletes a product together with its stock trail.
    ///
    /// A product that appears in recorded sales cannot be deleted; the
    /// foreign key error is returned and nothing is removed.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(product_id = id, "Deleting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM movimentacoes_estoque WHERE produto_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM produtos WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id.to_string()));
        }

        tx.commit().await?;

        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Adds `delta` to the stock of the product with `code`, never going
    /// below zero, and records the applied change as an `ajuste` movement.
    ///
    /// ## Returns
    /// * `Ok(true)` - Product found and updated
    /// * `Ok(false)` - No product carries this code
    pub async fn adjust_stock(&self, code: &str, delta: i64) -> DbResult<bool> {
        debug!(code = %code, delta, "Adjusting stock");

        let mut tx = self.pool.begin().await?;

        let current: Option<(i64, i64)> =
            sqlx::query_as("SELECT id, COALESCE(quantidade, 0) FROM produtos WHERE codigo = ?")
                .bind(code.trim())
                .fetch_optional(&mut *tx)
                .await?;

        let Some((product_id, quantity)) = current else {
            return Ok(false);
        };

        let new_quantity = (quantity + delta).max(0);
        let applied = new_quantity - quantity;

        sqlx::query("UPDATE produtos SET quantidade = ?, updated_at = ? WHERE id = ?")
            .bind(new_quantity)
            .bind(local_now())
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        if applied != 0 {
            sqlx::query(
                r#"
                INSERT INTO movimentacoes_estoque
                    (produto_id, quantidade, tipo_movimento, referencia, data_movimento)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(product_id)
            .bind(applied)
            .bind(STOCK_MOVEMENT_ADJUSTMENT)
            .bind(ADJUSTMENT_REFERENCE)
            .bind(local_now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(product_id, from = quantity, to = new_quantity, "Stock adjusted");
        Ok(true)
    }

    /// Stock trail of one product, newest first.
    pub async fn stock_movements(&self, product_id: i64) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<StockMovementRow> = sqlx::query_as(
            r#"
            SELECT
                id,
                produto_id AS product_id,
                quantidade AS quantity,
                tipo_movimento AS kind,
                referencia AS reference,
                data_movimento AS moved_at
            FROM movimentacoes_estoque
            WHERE produto_id = ?
            ORDER BY data_movimento DESC, id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Counts products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM produtos")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Id of the product carrying `code`, if any.
    async fn code_owner(&self, code: &str) -> DbResult<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM produtos WHERE codigo = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(id)
    }
}

fn validate_draft(draft: &ProductDraft) -> DbResult<()> {
    validate_product_code(&draft.code)?;
    validate_product_name(&draft.name)?;
    validate_price(draft.price)?;
    validate_stock_level("quantity", draft.quantity)?;
    validate_stock_level("min_quantity", draft.min_quantity)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn draft(code: &str, name: &str, price_cents: i64, quantity: i64) -> ProductDraft {
        ProductDraft {
            code: code.to_string(),
            name: name.to_string(),
            price: Money::from_cents(price_cents),
            quantity,
            min_quantity: 2,
            category: Some("Camisetas".to_string()),
            size: Some("M".to_string()),
            color: Some("Preto".to_string()),
            ..ProductDraft::default()
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = setup().await;
        let repo = db.products();

        let id = repo.create(&draft("CAM-001", "Camiseta Básica", 4990, 10)).await.unwrap();

        let by_id = repo.get_by_id(id).await.unwrap().unwrap();
        let by_code = repo.get_by_code("CAM-001").await.unwrap().unwrap();
        assert_eq!(by_id, by_code);
        assert_eq!(by_id.price.cents(), 4990);
        assert_eq!(by_id.quantity, 10);
        assert_eq!(by_id.size.as_deref(), Some("M"));
        assert!(by_id.description.is_none());
        assert!(by_id.created_at.is_some());

        assert!(repo.get_by_code("NOPE").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let db = setup().await;
        let repo = db.products();

        repo.create(&draft("CAM-001", "Camiseta", 4990, 10)).await.unwrap();
        let err = repo
            .create(&draft("CAM-001", "Outra", 1000, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_draft_is_rejected() {
        let db = setup().await;
        let repo = db.products();

        let mut bad = draft("", "Sem código", 100, 1);
        assert!(matches!(repo.create(&bad).await, Err(DbError::Validation(_))));

        bad.code = "X1".to_string();
        bad.price = Money::from_cents(-5);
        assert!(matches!(repo.create(&bad).await, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update() {
        let db = setup().await;
        let repo = db.products();

        let id = repo.create(&draft("CAM-001", "Camiseta", 4990, 10)).await.unwrap();
        let other = repo.create(&draft("CAM-002", "Regata", 2990, 5)).await.unwrap();

        let mut changed = draft("CAM-001B", "Camiseta Premium", 5990, 8);
        changed.brand = Some("Hering".to_string());
        repo.update(id, &changed).await.unwrap();

        let product = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(product.code, "CAM-001B");
        assert_eq!(product.price.cents(), 5990);
        assert_eq!(product.brand.as_deref(), Some("Hering"));

        let clash = repo.update(other, &draft("CAM-001B", "Regata", 2990, 5)).await;
        assert!(matches!(clash, Err(DbError::UniqueViolation { .. })));

        let missing = repo.update(999, &draft("ZZZ", "Nada", 1, 1)).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_categories() {
        let db = setup().await;
        let repo = db.products();

        repo.create(&draft("CAM-001", "Camiseta", 4990, 10)).await.unwrap();
        let mut calca = draft("CAL-001", "Calça Jeans", 12990, 3);
        calca.category = Some("Calças".to_string());
        repo.create(&calca).await.unwrap();
        let mut sem = draft("BRD-001", "Brinde", 0, 3);
        sem.category = None;
        repo.create(&sem).await.unwrap();

        assert_eq!(repo.categories().await.unwrap(), vec!["Calças", "Camisetas"]);

        let shirts = repo.list_by_category("Camisetas").await.unwrap();
        assert_eq!(shirts.len(), 1);
        assert_eq!(shirts[0].code, "CAM-001");

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Brinde", "Calça Jeans", "Camiseta"]);
    }

    #[tokio::test]
    async fn test_adjust_stock_clamps_at_zero() {
        let db = setup().await;
        let repo = db.products();

        let id = repo.create(&draft("CAM-001", "Camiseta", 4990, 5)).await.unwrap();

        assert!(repo.adjust_stock("CAM-001", 3).await.unwrap());
        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().quantity, 8);

        assert!(repo.adjust_stock("CAM-001", -20).await.unwrap());
        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().quantity, 0);

        assert!(!repo.adjust_stock("NOPE", 1).await.unwrap());

        let trail = repo.stock_movements(id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(trail.iter().all(|m| m.kind == STOCK_MOVEMENT_ADJUSTMENT));
        let total: i64 = trail.iter().map(|m| m.quantity).sum();
        assert_eq!(total, -5);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = setup().await;
        let repo = db.products();

        let id = repo.create(&draft("CAM-001", "Camiseta", 4990, 5)).await.unwrap();
        repo.adjust_stock("CAM-001", 1).await.unwrap();

        repo.delete(id).await.unwrap();
        assert!(repo.get_by_id(id).await.unwrap().is_none());
        assert!(repo.stock_movements(id).await.unwrap().is_empty());

        assert!(matches!(repo.delete(id).await, Err(DbError::NotFound { .. })));
    }
}
