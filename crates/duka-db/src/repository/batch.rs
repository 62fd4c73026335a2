//! # Batch Repository
//!
//! Database operations for product batches.
//!
//! ## Quantity Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  take_quantity(batch, 5)                                               │
//! │                                                                         │
//! │  UPDATE product_batches                                                │
//! │     SET quantity = quantity - 5                                        │
//! │   WHERE id = ? AND quantity >= 5      ← check and write are one stmt  │
//! │                                                                         │
//! │  rows_affected = 1  → taken                                            │
//! │  rows_affected = 0  → not enough left (nothing written)                │
//! │                                                                         │
//! │  CHECK (quantity >= 0) on the table backs this up.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only [`crate::ledger`] calls the quantity functions, so every change
//! leaves a stock entry behind.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::ProductBatch;

pub async fn insert(conn: &mut SqliteConnection, batch: &ProductBatch) -> DbResult<()> {
    debug!(id = %batch.id, product_id = %batch.product_id, code = %batch.batch_code, "Inserting batch");

    sqlx::query(
        r#"
        INSERT INTO product_batches (
            id, product_id, batch_code, expiry_date,
            buying_price_cents, selling_price_cents, wholesale_price_cents,
            quantity, recorded_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.product_id)
    .bind(&batch.batch_code)
    .bind(batch.expiry_date)
    .bind(batch.buying_price_cents)
    .bind(batch.selling_price_cents)
    .bind(batch.wholesale_price_cents)
    .bind(batch.quantity)
    .bind(&batch.recorded_by)
    .bind(batch.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ProductBatch>> {
    let batch = sqlx::query_as::<_, ProductBatch>(
        r#"
        SELECT id, product_id, batch_code, expiry_date,
               buying_price_cents, selling_price_cents, wholesale_price_cents,
               quantity, recorded_by, created_at
        FROM product_batches
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(batch)
}

pub async fn list_for_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<ProductBatch>> {
    let batches = sqlx::query_as::<_, ProductBatch>(
        r#"
        SELECT id, product_id, batch_code, expiry_date,
               buying_price_cents, selling_price_cents, wholesale_price_cents,
               quantity, recorded_by, created_at
        FROM product_batches
        WHERE product_id = ?1
        ORDER BY expiry_date, batch_code
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(batches)
}

pub async fn code_exists(conn: &mut SqliteConnection, product_id: &str, batch_code: &str) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM product_batches WHERE product_id = ?1 AND batch_code = ?2",
    )
    .bind(product_id)
    .bind(batch_code)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

/// Writes new prices and expiry. Quantity and ownership are untouched.
pub async fn update_details(conn: &mut SqliteConnection, batch: &ProductBatch) -> DbResult<()> {
    debug!(id = %batch.id, "Updating batch prices");

    sqlx::query(
        r#"
        UPDATE product_batches
        SET buying_price_cents = ?1,
            selling_price_cents = ?2,
            wholesale_price_cents = ?3,
            expiry_date = ?4
        WHERE id = ?5
        "#,
    )
    .bind(batch.buying_price_cents)
    .bind(batch.selling_price_cents)
    .bind(batch.wholesale_price_cents)
    .bind(batch.expiry_date)
    .bind(&batch.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Takes `quantity` out of the batch if at least that much is left.
///
/// Returns `false` (and writes nothing) when the batch is short or missing.
pub async fn take_quantity(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE product_batches
        SET quantity = quantity - ?1
        WHERE id = ?2 AND quantity >= ?1
        "#,
    )
    .bind(quantity)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Puts `quantity` back. Returns `false` when the batch is missing.
pub async fn put_quantity(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<bool> {
    let result = sqlx::query("UPDATE product_batches SET quantity = quantity + ?1 WHERE id = ?2")
        .bind(quantity)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Whether any order item, sale item or refund points at the batch.
pub async fn is_referenced(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let referenced: i64 = sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM order_items WHERE batch_id = ?1)
            OR EXISTS (SELECT 1 FROM sale_items WHERE batch_id = ?1)
            OR EXISTS (SELECT 1 FROM refunds WHERE batch_id = ?1)
        "#,
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(referenced != 0)
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting batch");

    sqlx::query("DELETE FROM product_batches WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductBatch>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Batches of a product, soonest expiry first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        let mut conn = self.pool.acquire().await?;
        list_for_product(&mut conn, product_id).await
    }
}
