//! # Product Repository
//!
//! Database operations for categories and products.
//!
//! Products carry no stock column. Anything that needs a quantity goes
//! through [`super::batch`] and sums batches.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::{Category, Product};

// =============================================================================
// Transactional Operations
// =============================================================================

pub async fn insert_category(conn: &mut SqliteConnection, category: &Category) -> DbResult<()> {
    debug!(id = %category.id, name = %category.name, "Inserting category");

    sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
        .bind(&category.id)
        .bind(&category.name)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn fetch_category(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(category)
}

pub async fn insert_product(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, name = %product.name, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (id, name, category_id, low_stock_threshold, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.category_id)
    .bind(product.low_stock_threshold)
    .bind(product.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, category_id, low_stock_threshold, created_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to the catalogue.
///
/// ## Usage
/// ```rust,ignore
/// let products = db.products().search("panadol", 20).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Case-insensitive substring search on the product name.
    ///
    /// An empty query lists products alphabetically.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = limit, "Searching products");

        let pattern = format!("%{}%", escape_like(query));
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category_id, low_stock_threshold, created_at
            FROM products
            WHERE name LIKE ?1 ESCAPE '\'
            ORDER BY name COLLATE NOCASE
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    pub async fn list_for_category(&self, category_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category_id, low_stock_threshold, created_at
            FROM products
            WHERE category_id = ?1
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn categories(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;

        Ok(categories)
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
