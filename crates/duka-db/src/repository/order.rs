//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! Status changes go through [`set_status`], a compare-and-set on the
//! current status. Two cashiers confirming the same order race on that one
//! UPDATE; the second sees zero rows changed.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::placeholders;
use crate::error::DbResult;
use duka_core::{Channel, Order, OrderItem, OrderStatus};

pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, order_type = %order.order_type, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, customer_id, order_type, status, notes,
            discount_cents, rejection_reason, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.customer_id)
    .bind(order.order_type)
    .bind(order.status)
    .bind(&order.notes)
    .bind(order.discount_cents)
    .bind(&order.rejection_reason)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem, position: usize) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (id, order_id, product_id, batch_id, quantity, unit_price_cents, position)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.batch_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(position as i64)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, customer_id, order_type, status, notes,
               discount_cents, rejection_reason, created_at, updated_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

pub async fn items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, batch_id, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub async fn delete_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Moves the order to `to` if its status is still one of `from`.
///
/// Returns `false` when the order is missing or has moved on.
pub async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: &[OrderStatus],
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    if from.is_empty() {
        return Ok(false);
    }

    let sql = format!(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
        placeholders(4, from.len())
    );

    let mut query = sqlx::query(&sql).bind(to).bind(now).bind(id);
    for status in from {
        query = query.bind(*status);
    }

    let result = query.execute(&mut *conn).await?;
    debug!(id = %id, to = %to, changed = result.rows_affected(), "Order status update");

    Ok(result.rows_affected() == 1)
}

pub async fn set_rejection_reason(conn: &mut SqliteConnection, id: &str, reason: Option<&str>) -> DbResult<()> {
    sqlx::query("UPDATE orders SET rejection_reason = ?1 WHERE id = ?2")
        .bind(reason)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Rewrites the editable header fields of an order.
pub async fn update_header(
    conn: &mut SqliteConnection,
    id: &str,
    order_type: Channel,
    customer_id: Option<&str>,
    notes: Option<&str>,
    discount_cents: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET order_type = ?1, customer_id = ?2, notes = ?3, discount_cents = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(order_type)
    .bind(customer_id)
    .bind(notes)
    .bind(discount_cents)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Deletes the order; its items go with it.
pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting order");

    sqlx::query("DELETE FROM orders WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, order_id).await
    }

    /// Orders in `status`, newest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, customer_id, order_type, status, notes,
                   discount_cents, rejection_reason, created_at, updated_at
            FROM orders
            WHERE status = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}
