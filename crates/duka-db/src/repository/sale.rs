//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## What Changes After Insert
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales row                                                              │
//! │                                                                         │
//! │  frozen at insert            rewritten by update_projection            │
//! │  ────────────────            ──────────────────────────────            │
//! │  total / discount / final    paid_cents        (Σ positive payments)   │
//! │  sale_type, customer         refund_total_cents (Σ |negative payments|)│
//! │  payment_method, date        status, payment_status, is_loan           │
//! │                                                                         │
//! │  sale_items rows are never updated.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::{PaymentStatus, Sale, SaleItem, SaleStatus};

pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, final_cents = sale.final_cents, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, order_id, user_id, customer_id, sale_type, status, payment_status, is_loan,
            total_cents, discount_cents, final_cents, paid_cents, refund_total_cents,
            payment_method, date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.order_id)
    .bind(&sale.user_id)
    .bind(&sale.customer_id)
    .bind(sale.sale_type)
    .bind(sale.status)
    .bind(sale.payment_status)
    .bind(sale.is_loan)
    .bind(sale.total_cents)
    .bind(sale.discount_cents)
    .bind(sale.final_cents)
    .bind(sale.paid_cents)
    .bind(sale.refund_total_cents)
    .bind(sale.payment_method)
    .bind(sale.date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem, position: usize) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, batch_id, quantity,
            price_per_unit_cents, total_price_cents, position
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.batch_id)
    .bind(item.quantity)
    .bind(item.price_per_unit_cents)
    .bind(item.total_price_cents)
    .bind(position as i64)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(
        r#"
        SELECT id, order_id, user_id, customer_id, sale_type, status, payment_status, is_loan,
               total_cents, discount_cents, final_cents, paid_cents, refund_total_cents,
               payment_method, date
        FROM sales
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sale)
}

pub async fn items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT id, sale_id, product_id, batch_id, quantity, price_per_unit_cents, total_price_cents
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Writes the ledger projection and the statuses derived from it.
pub async fn update_projection(
    conn: &mut SqliteConnection,
    sale_id: &str,
    paid_cents: i64,
    refund_total_cents: i64,
    status: SaleStatus,
    payment_status: PaymentStatus,
    is_loan: bool,
) -> DbResult<()> {
    debug!(
        id = %sale_id,
        paid_cents,
        refund_total_cents,
        payment_status = %payment_status,
        "Updating sale projection"
    );

    sqlx::query(
        r#"
        UPDATE sales
        SET paid_cents = ?1, refund_total_cents = ?2, status = ?3, payment_status = ?4, is_loan = ?5
        WHERE id = ?6
        "#,
    )
    .bind(paid_cents)
    .bind(refund_total_cents)
    .bind(status)
    .bind(payment_status)
    .bind(is_loan)
    .bind(sale_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, sale_id).await
    }

    /// The sale produced by confirming `order_id`, if any.
    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, order_id, user_id, customer_id, sale_type, status, payment_status, is_loan,
                   total_cents, discount_cents, final_cents, paid_cents, refund_total_cents,
                   payment_method, date
            FROM sales
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Loans with money still owed, oldest first.
    pub async fn open_loans(&self) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, order_id, user_id, customer_id, sale_type, status, payment_status, is_loan,
                   total_cents, discount_cents, final_cents, paid_cents, refund_total_cents,
                   payment_method, date
            FROM sales
            WHERE is_loan = 1
              AND status = 'confirmed'
              AND payment_status IN ('not_paid', 'partial')
            ORDER BY date
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}
