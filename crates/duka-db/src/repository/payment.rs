//! # Payment Repository
//!
//! The payment ledger. It is the source of truth for how much was paid and
//! refunded on a sale; `sales.paid_cents` and `sales.refund_total_cents`
//! are projections of [`amounts`].

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::{Money, Payment};

pub async fn insert(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    debug!(
        id = %payment.id,
        sale_id = %payment.sale_id,
        amount_cents = payment.amount_cents,
        "Recording payment"
    );

    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_id, refund_id, amount_cents, cashier_id, payment_method, payment_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_id)
    .bind(&payment.refund_id)
    .bind(payment.amount_cents)
    .bind(&payment.cashier_id)
    .bind(payment.payment_method)
    .bind(payment.payment_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Every signed amount on the sale's ledger.
pub async fn amounts(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<Money>> {
    let cents: Vec<i64> = sqlx::query_scalar("SELECT amount_cents FROM payments WHERE sale_id = ?1")
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(cents.into_iter().map(Money::from_cents).collect())
}

/// Removes the reversal row written for `refund_id`.
pub async fn delete_for_refund(conn: &mut SqliteConnection, refund_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM payments WHERE refund_id = ?1")
        .bind(refund_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn list_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, sale_id, refund_id, amount_cents, cashier_id, payment_method, payment_date
        FROM payments
        WHERE sale_id = ?1
        ORDER BY payment_date, rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// The ledger of a sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        list_for_sale(&mut conn, sale_id).await
    }
}
