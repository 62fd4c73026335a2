//! # Batch Inventory Ledger
//!
//! The only code that changes a batch quantity. Every change writes a
//! stock entry in the same transaction.
//!
//! ## Decrement Under Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Batch B-001 quantity = 5                                              │
//! │                                                                         │
//! │  Sale A (qty 5)                      Sale B (qty 5)                     │
//! │  ──────────────                      ──────────────                     │
//! │  UPDATE .. WHERE quantity >= 5       (waits on SQLite write lock)      │
//! │  rows = 1, entry 'removed'                                              │
//! │  COMMIT                                                                 │
//! │                                      UPDATE .. WHERE quantity >= 5     │
//! │                                      rows = 0                           │
//! │                                      re-read: quantity = 0              │
//! │                                      InsufficientStock { available: 0 } │
//! │                                      ROLLBACK                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{batch, stock};
use duka_core::inventory::{check_decrement, check_increment};
use duka_core::{CoreError, ProductBatch, StockEntry, StockEntryType};

/// Takes `quantity` out of `batch` and logs an `entry_type` movement.
///
/// `batch` may be stale; the conditional UPDATE is what decides. On
/// failure the error reports the quantity actually left.
pub async fn decrement(
    conn: &mut SqliteConnection,
    batch: &ProductBatch,
    quantity: i64,
    entry_type: StockEntryType,
    actor_id: &str,
) -> DbResult<()> {
    check_decrement(batch, quantity)?;

    if !batch::take_quantity(conn, &batch.id, quantity).await? {
        let current = batch::fetch(conn, &batch.id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch.id.clone()))?;

        warn!(
            batch = %batch.batch_code,
            available = current.quantity,
            requested = quantity,
            "Stock decrement refused"
        );

        return Err(CoreError::InsufficientStock {
            batch_code: current.batch_code,
            available: current.quantity,
            requested: quantity,
        }
        .into());
    }

    record(conn, batch, quantity, entry_type, actor_id).await
}

/// Puts `quantity` back into `batch` and logs an `entry_type` movement.
pub async fn increment(
    conn: &mut SqliteConnection,
    batch: &ProductBatch,
    quantity: i64,
    entry_type: StockEntryType,
    actor_id: &str,
) -> DbResult<()> {
    check_increment(quantity)?;

    if !batch::put_quantity(conn, &batch.id, quantity).await? {
        return Err(CoreError::BatchNotFound(batch.id.clone()).into());
    }

    record(conn, batch, quantity, entry_type, actor_id).await
}

/// Logs a movement without touching the quantity.
///
/// Used for the write-off when a batch is deleted with stock left.
pub async fn record(
    conn: &mut SqliteConnection,
    batch: &ProductBatch,
    quantity: i64,
    entry_type: StockEntryType,
    actor_id: &str,
) -> DbResult<()> {
    debug!(
        batch = %batch.batch_code,
        entry_type = %entry_type,
        quantity,
        "Stock movement"
    );

    let entry = StockEntry {
        id: Uuid::new_v4().to_string(),
        product_id: batch.product_id.clone(),
        batch_id: Some(batch.id.clone()),
        batch_code: batch.batch_code.clone(),
        entry_type,
        quantity,
        recorded_by: actor_id.to_string(),
        created_at: Utc::now(),
    };

    stock::insert(conn, &entry).await
}
