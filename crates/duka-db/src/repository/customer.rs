//! # Customer Repository

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::Customer;

pub async fn insert(conn: &mut SqliteConnection, customer: &Customer) -> DbResult<()> {
    debug!(id = %customer.id, "Inserting customer");

    sqlx::query("INSERT INTO customers (id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.created_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT id, name, phone, created_at FROM customers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

pub async fn find_by_phone(conn: &mut SqliteConnection, phone: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT id, name, phone, created_at FROM customers WHERE phone = ?1",
    )
    .bind(phone)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn find_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        find_by_phone(&mut conn, phone).await
    }

    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT id, name, phone, created_at FROM customers ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }
}
