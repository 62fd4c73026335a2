//! # Stock Entry Repository
//!
//! The append-only stock movement trail. Rows are inserted by
//! [`crate::ledger`] and never updated or deleted.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use duka_core::StockEntry;

pub async fn insert(conn: &mut SqliteConnection, entry: &StockEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_entries (
            id, product_id, batch_id, batch_code, entry_type, quantity, recorded_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.product_id)
    .bind(&entry.batch_id)
    .bind(&entry.batch_code)
    .bind(entry.entry_type)
    .bind(entry.quantity)
    .bind(&entry.recorded_by)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct StockEntryRepository {
    pool: SqlitePool,
}

impl StockEntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockEntryRepository { pool }
    }

    /// Movements of one batch, oldest first.
    pub async fn for_batch(&self, batch_id: &str) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT id, product_id, batch_id, batch_code, entry_type, quantity, recorded_by, created_at
            FROM stock_entries
            WHERE batch_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Movements of every batch of a product, deleted batches included.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT id, product_id, batch_id, batch_code, entry_type, quantity, recorded_by, created_at
            FROM stock_entries
            WHERE product_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
