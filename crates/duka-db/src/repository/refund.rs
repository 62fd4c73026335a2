//! # Refund Repository

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::Refund;

pub async fn insert(conn: &mut SqliteConnection, refund: &Refund) -> DbResult<()> {
    debug!(id = %refund.id, sale_id = %refund.sale_id, item = %refund.sale_item_id, "Inserting refund");

    sqlx::query(
        r#"
        INSERT INTO refunds (
            id, sale_id, sale_item_id, product_id, batch_id, quantity,
            refund_amount_cents, reason, refunded_by, refund_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&refund.id)
    .bind(&refund.sale_id)
    .bind(&refund.sale_item_id)
    .bind(&refund.product_id)
    .bind(&refund.batch_id)
    .bind(refund.quantity)
    .bind(refund.refund_amount_cents)
    .bind(&refund.reason)
    .bind(&refund.refunded_by)
    .bind(refund.refund_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Refund>> {
    let refund = sqlx::query_as::<_, Refund>(
        r#"
        SELECT id, sale_id, sale_item_id, product_id, batch_id, quantity,
               refund_amount_cents, reason, refunded_by, refund_date
        FROM refunds
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(refund)
}

pub async fn list_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<Refund>> {
    let refunds = sqlx::query_as::<_, Refund>(
        r#"
        SELECT id, sale_id, sale_item_id, product_id, batch_id, quantity,
               refund_amount_cents, reason, refunded_by, refund_date
        FROM refunds
        WHERE sale_id = ?1
        ORDER BY refund_date, rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(refunds)
}

/// Sale item ids on `sale_id` that already have a refund.
pub async fn refunded_item_ids(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT sale_item_id FROM refunds WHERE sale_id = ?1")
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(ids)
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting refund");

    sqlx::query("DELETE FROM refunds WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

impl RefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Refund>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Refund>> {
        let mut conn = self.pool.acquire().await?;
        list_for_sale(&mut conn, sale_id).await
    }
}
