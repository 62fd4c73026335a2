//! Shared fixtures for database tests.

use chrono::{Duration, Utc};
use std::path::PathBuf;
use uuid::Uuid;

use crate::pool::{Database, DbConfig};
use crate::workflow::{NewBatch, NewProduct};
use duka_core::{Actor, Product, ProductBatch, Role};

pub(crate) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(crate) fn cashier() -> Actor {
    Actor::new("cashier-1", Role::Cashier)
}

pub(crate) fn staff() -> Actor {
    Actor::new("staff-1", Role::Staff)
}

pub(crate) struct Fixture {
    pub product: Product,
    pub batch: ProductBatch,
}

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// File database in the temp dir, for tests that need real concurrent
/// writers. The caller removes the file.
pub(crate) async fn file_db() -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("duka-race-{}.db", Uuid::new_v4()));
    let db = Database::new(
        DbConfig::new(&path)
            .max_connections(4)
            .busy_timeout(std::time::Duration::from_secs(5)),
    )
    .await
    .unwrap();
    (db, path)
}

/// Batch priced 5.00 buying, 10.00 retail, 8.00 wholesale, a year to expiry.
pub(crate) fn batch_request(product_id: &str, code: &str, quantity: i64) -> NewBatch {
    NewBatch {
        product_id: product_id.to_string(),
        batch_code: code.to_string(),
        expiry_date: Utc::now().date_naive() + Duration::days(365),
        buying_price_cents: 500,
        selling_price_cents: 1000,
        wholesale_price_cents: 800,
        quantity,
    }
}

pub(crate) async fn product_with_batch(db: &Database, quantity: i64) -> Fixture {
    let inventory = db.inventory();
    let product = inventory
        .create_product(
            &admin(),
            NewProduct {
                name: "Panadol 500mg".into(),
                category_id: None,
                low_stock_threshold: 2,
            },
        )
        .await
        .unwrap();

    let batch = inventory
        .add_batch(&admin(), batch_request(&product.id, "B-001", quantity))
        .await
        .unwrap();

    Fixture { product, batch }
}

/// In-memory database with one product and one batch of `quantity`.
pub(crate) async fn setup(quantity: i64) -> (Database, Fixture) {
    let db = test_db().await;
    let fixture = product_with_batch(&db, quantity).await;
    (db, fixture)
}

pub(crate) async fn stock_of(db: &Database, batch_id: &str) -> i64 {
    db.batches().get_by_id(batch_id).await.unwrap().unwrap().quantity
}
