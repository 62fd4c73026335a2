//! # Inventory Workflow
//!
//! Catalogue and batch management. Quantities only move through
//! [`crate::ledger`], so restocks, corrections and write-offs all show up
//! in the stock movement trail.
//!
//! ## Batch Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_batch ──► row at qty 0 ──► ledger +qty ('added')                  │
//! │      │                                                                  │
//! │      ├── sales / refunds ──► ledger ('removed' / 'returned')           │
//! │      ├── adjust_batch_quantity ──► ledger ('added' / 'removed')        │
//! │      ├── edit_batch_prices ──► new prices, old snapshots untouched     │
//! │      │                                                                  │
//! │      └── delete_batch                                                   │
//! │            referenced by orders/sales/refunds? ──► BatchInUse          │
//! │            otherwise: 'deleted' entry for what is left, row removed    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::authorize;
use crate::error::{DbError, DbResult};
use crate::ledger;
use crate::pool::Database;
use crate::repository::{batch, product};
use duka_core::inventory::adjustment;
use duka_core::validation::{
    validate_batch_code, validate_price_cents, validate_product_name, validate_quantity,
};
use duka_core::{
    Actor, Capability, Category, CoreError, Product, ProductBatch, ProductStock, StockEntry,
    StockEntryType, ValidationError,
};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub low_stock_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub product_id: String,
    pub batch_code: String,
    pub expiry_date: NaiveDate,
    pub buying_price_cents: i64,
    pub selling_price_cents: i64,
    pub wholesale_price_cents: i64,
    pub quantity: i64,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPriceUpdate {
    pub buying_price_cents: Option<i64>,
    pub selling_price_cents: Option<i64>,
    pub wholesale_price_cents: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

// =============================================================================
// Workflow
// =============================================================================

#[derive(Debug, Clone)]
pub struct InventoryWorkflow {
    db: Database,
}

impl InventoryWorkflow {
    pub fn new(db: Database) -> Self {
        InventoryWorkflow { db }
    }

    pub async fn create_category(&self, actor: &Actor, name: &str) -> DbResult<Category> {
        authorize(&self.db, actor, Capability::ManageInventory)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "category_name".to_string(),
            }
            .into());
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };

        let mut conn = self.db.pool().acquire().await?;
        product::insert_category(&mut conn, &category)
            .await
            .map_err(|err| match err {
                DbError::UniqueViolation { .. } => DbError::duplicate("category", name),
                other => other,
            })?;

        Ok(category)
    }

    pub async fn create_product(&self, actor: &Actor, request: NewProduct) -> DbResult<Product> {
        authorize(&self.db, actor, Capability::ManageInventory)?;
        validate_product_name(&request.name)?;
        if request.low_stock_threshold < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "low_stock_threshold".to_string(),
            }
            .into());
        }

        let mut tx = self.db.begin_write().await?;

        if let Some(category_id) = &request.category_id {
            if product::fetch_category(&mut tx, category_id).await?.is_none() {
                return Err(DbError::not_found("Category", category_id.as_str()));
            }
        }

        let created = Product {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            category_id: request.category_id,
            low_stock_threshold: request.low_stock_threshold,
            created_at: Utc::now(),
        };
        product::insert_product(&mut tx, &created).await?;

        tx.commit().await?;

        info!(product_id = %created.id, name = %created.name, "Product created");
        Ok(created)
    }

    /// Adds a batch. The row starts at zero and the quantity comes in
    /// through the ledger as an `added` movement.
    pub async fn add_batch(&self, actor: &Actor, request: NewBatch) -> DbResult<ProductBatch> {
        authorize(&self.db, actor, Capability::ManageInventory)?;
        validate_batch_code(&request.batch_code)?;
        validate_price_cents("buying_price", request.buying_price_cents)?;
        validate_price_cents("selling_price", request.selling_price_cents)?;
        validate_price_cents("wholesale_price", request.wholesale_price_cents)?;
        validate_quantity(request.quantity)?;

        let code = request.batch_code.trim().to_string();
        let mut tx = self.db.begin_write().await?;

        if product::fetch_product(&mut tx, &request.product_id).await?.is_none() {
            return Err(CoreError::ProductNotFound(request.product_id).into());
        }
        if batch::code_exists(&mut tx, &request.product_id, &code).await? {
            return Err(ValidationError::Duplicate {
                field: "batch_code".to_string(),
                value: code,
            }
            .into());
        }

        let mut created = ProductBatch {
            id: Uuid::new_v4().to_string(),
            product_id: request.product_id,
            batch_code: code,
            expiry_date: request.expiry_date,
            buying_price_cents: request.buying_price_cents,
            selling_price_cents: request.selling_price_cents,
            wholesale_price_cents: request.wholesale_price_cents,
            quantity: 0,
            recorded_by: actor.user_id.clone(),
            created_at: Utc::now(),
        };
        batch::insert(&mut tx, &created).await?;
        ledger::increment(&mut tx, &created, request.quantity, StockEntryType::Added, &actor.user_id).await?;
        created.quantity = request.quantity;

        tx.commit().await?;

        info!(
            batch_id = %created.id,
            batch = %created.batch_code,
            quantity = created.quantity,
            "Batch added"
        );
        Ok(created)
    }

    /// Changes prices and/or expiry. Existing order and sale items keep the
    /// prices they were written with.
    pub async fn edit_batch_prices(
        &self,
        actor: &Actor,
        batch_id: &str,
        update: BatchPriceUpdate,
    ) -> DbResult<ProductBatch> {
        authorize(&self.db, actor, Capability::ManageInventory)?;

        let mut tx = self.db.begin_write().await?;
        let mut current = batch::fetch(&mut tx, batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;

        if let Some(cents) = update.buying_price_cents {
            validate_price_cents("buying_price", cents)?;
            current.buying_price_cents = cents;
        }
        if let Some(cents) = update.selling_price_cents {
            validate_price_cents("selling_price", cents)?;
            current.selling_price_cents = cents;
        }
        if let Some(cents) = update.wholesale_price_cents {
            validate_price_cents("wholesale_price", cents)?;
            current.wholesale_price_cents = cents;
        }
        if let Some(date) = update.expiry_date {
            current.expiry_date = date;
        }

        batch::update_details(&mut tx, &current).await?;
        tx.commit().await?;

        info!(batch_id = %current.id, "Batch prices updated");
        Ok(current)
    }

    /// Sets the batch quantity after a stock count; the difference is logged.
    pub async fn adjust_batch_quantity(
        &self,
        actor: &Actor,
        batch_id: &str,
        new_quantity: i64,
    ) -> DbResult<ProductBatch> {
        authorize(&self.db, actor, Capability::ManageInventory)?;

        let mut tx = self.db.begin_write().await?;
        let mut current = batch::fetch(&mut tx, batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;

        match adjustment(&current, new_quantity)? {
            None => return Ok(current),
            Some((StockEntryType::Added, delta)) => {
                ledger::increment(&mut tx, &current, delta, StockEntryType::Added, &actor.user_id).await?
            }
            Some((entry_type, delta)) => {
                ledger::decrement(&mut tx, &current, delta, entry_type, &actor.user_id).await?
            }
        }
        tx.commit().await?;

        info!(
            batch_id = %current.id,
            from = current.quantity,
            to = new_quantity,
            "Batch quantity adjusted"
        );
        current.quantity = new_quantity;
        Ok(current)
    }

    /// Deletes a batch nothing refers to.
    ///
    /// Any remaining quantity is written off with a `deleted` entry. The
    /// entries keep the batch code after the row is gone.
    pub async fn delete_batch(&self, actor: &Actor, batch_id: &str) -> DbResult<()> {
        authorize(&self.db, actor, Capability::ManageInventory)?;

        let mut tx = self.db.begin_write().await?;
        let current = batch::fetch(&mut tx, batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;

        if batch::is_referenced(&mut tx, batch_id).await? {
            return Err(CoreError::BatchInUse(current.batch_code).into());
        }

        if current.quantity > 0 {
            ledger::record(&mut tx, &current, current.quantity, StockEntryType::Deleted, &actor.user_id).await?;
        }
        batch::delete(&mut tx, batch_id).await?;

        tx.commit().await?;

        info!(batch = %current.batch_code, written_off = current.quantity, "Batch deleted");
        Ok(())
    }

    /// Ledger decrement for a single batch, logged as `removed`.
    pub async fn decrement_stock(&self, actor: &Actor, batch_id: &str, quantity: i64) -> DbResult<ProductBatch> {
        self.move_stock(actor, batch_id, quantity, StockEntryType::Removed).await
    }

    /// Ledger increment for a single batch, logged as `added`.
    pub async fn increment_stock(&self, actor: &Actor, batch_id: &str, quantity: i64) -> DbResult<ProductBatch> {
        self.move_stock(actor, batch_id, quantity, StockEntryType::Added).await
    }

    async fn move_stock(
        &self,
        actor: &Actor,
        batch_id: &str,
        quantity: i64,
        entry_type: StockEntryType,
    ) -> DbResult<ProductBatch> {
        authorize(&self.db, actor, Capability::ManageInventory)?;

        let mut tx = self.db.begin_write().await?;
        let current = batch::fetch(&mut tx, batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;

        if entry_type == StockEntryType::Added {
            ledger::increment(&mut tx, &current, quantity, entry_type, &actor.user_id).await?;
        } else {
            ledger::decrement(&mut tx, &current, quantity, entry_type, &actor.user_id).await?;
        }

        let updated = batch::fetch(&mut tx, batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;
        tx.commit().await?;

        Ok(updated)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Stock of a product as of `today`, summed from its batches.
    pub async fn product_stock(&self, product_id: &str, today: NaiveDate) -> DbResult<ProductStock> {
        let mut conn = self.db.pool().acquire().await?;
        let found = product::fetch_product(&mut conn, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let batches = batch::list_for_product(&mut conn, product_id).await?;

        Ok(ProductStock::compute(&found, &batches, today, &self.db.store_config().stock))
    }

    pub async fn stock_movements(&self, batch_id: &str) -> DbResult<Vec<StockEntry>> {
        self.db.stock_entries().for_batch(batch_id).await
    }

    pub async fn stock_movements_for_product(&self, product_id: &str) -> DbResult<Vec<StockEntry>> {
        self.db.stock_entries().for_product(product_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
