//! # Refund Workflow
//!
//! Hands money back and puts goods back on the shelf. A refund never edits
//! or deletes the original payment; it adds a negative ledger row tied to
//! the refund, and the sale's totals are projected from the ledger again.
//!
//! ## Item Refund
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sale paid/partial? ───────────────────────► NotPaid / AlreadyRefunded  │
//! │  now <= sale.date + item window? ──────────► RefundWindowExpired        │
//! │  product on sale, not refunded yet? ───────► ProductNotInSale /         │
//! │                                              ItemAlreadyRefunded        │
//! │  qty == sold qty? ─────────────────────────► PartialRefundNotAllowed    │
//! │                                                                         │
//! │  amount = min(item total, paid − refund_total)                          │
//! │  ledger +qty ('returned')                                               │
//! │  INSERT refund, INSERT payment (−amount, refund_id)                     │
//! │  reproject; every item refunded ──► sale 'refunded'                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`RefundWorkflow::reverse_refund`] undoes one refund exactly: the stock
//! goes out again as `removed`, the refund and its ledger row are removed,
//! and the sale is projected from what is left.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::{authorize, reproject_sale};
use crate::error::DbResult;
use crate::ledger;
use crate::pool::Database;
use crate::repository::{batch, payment, refund, sale};
use duka_core::refund::{
    allocate_sale_refund, check_refundable, item_refund_amount, select_refund_item, RefundScope,
};
use duka_core::validation::validate_note;
use duka_core::{
    Actor, Capability, CoreError, Money, Payment, PaymentMethod, Refund, Sale, SaleItem,
    StockEntryType,
};

#[derive(Debug, Clone)]
pub struct RefundWorkflow {
    db: Database,
}

impl RefundWorkflow {
    pub fn new(db: Database) -> Self {
        RefundWorkflow { db }
    }

    /// Refunds every unit of `product_id` sold on one line of the sale.
    ///
    /// ## Errors
    /// - `NotPaid` / `AlreadyRefunded` when the sale is not refundable
    /// - `RefundWindowExpired` past the item window
    /// - `ProductNotInSale` / `ItemAlreadyRefunded`
    /// - `PartialRefundNotAllowed` when `quantity` differs from the sold quantity
    pub async fn refund_item(
        &self,
        actor: &Actor,
        sale_id: &str,
        product_id: &str,
        quantity: i64,
        reason: Option<String>,
    ) -> DbResult<Refund> {
        authorize(&self.db, actor, Capability::Refund)?;
        validate_note("reason", reason.as_deref())?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_sale(&mut tx, sale_id).await?;

        check_refundable(&current)?;
        self.db
            .store_config()
            .refund
            .check_window(&current, Utc::now(), RefundScope::Item)?;

        let items = sale::items(&mut tx, sale_id).await?;
        let refunded_ids = refund::refunded_item_ids(&mut tx, sale_id).await?;
        let item = select_refund_item(&current, &items, &refunded_ids, product_id, quantity)?;
        let amount = item_refund_amount(&current, item);

        let created = write_refund(&mut tx, actor, &current, item, amount, reason.as_deref()).await?;

        let all_refunded = refunded_ids.len() + 1 == items.len();
        let updated = reproject_sale(&mut tx, sale_id, all_refunded).await?;

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            product_id = %product_id,
            quantity,
            amount = %amount,
            sale_status = %updated.status,
            "Item refunded"
        );
        Ok(created)
    }

    /// Refunds every item not refunded yet and marks the sale refunded.
    ///
    /// Everything still held (`paid − refund_total`) is handed back, split
    /// across the items by their totals.
    pub async fn refund_sale(&self, actor: &Actor, sale_id: &str, reason: Option<String>) -> DbResult<Sale> {
        authorize(&self.db, actor, Capability::Refund)?;
        validate_note("reason", reason.as_deref())?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_sale(&mut tx, sale_id).await?;

        check_refundable(&current)?;
        self.db
            .store_config()
            .refund
            .check_window(&current, Utc::now(), RefundScope::WholeSale)?;

        let items = sale::items(&mut tx, sale_id).await?;
        let refunded_ids = refund::refunded_item_ids(&mut tx, sale_id).await?;
        let pending: Vec<&SaleItem> = items
            .iter()
            .filter(|item| !refunded_ids.contains(&item.id))
            .collect();
        if pending.is_empty() {
            return Err(CoreError::AlreadyRefunded(sale_id.to_string()).into());
        }

        let shares = allocate_sale_refund(&current, &pending);
        for (item, amount) in pending.iter().zip(shares) {
            write_refund(&mut tx, actor, &current, item, amount, reason.as_deref()).await?;
        }

        let updated = reproject_sale(&mut tx, sale_id, true).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            items = pending.len(),
            refund_total = %updated.refund_total(),
            "Sale refunded"
        );
        Ok(updated)
    }

    /// Undoes a refund: stock leaves the batch again and the reversal row is
    /// removed from the ledger.
    pub async fn reverse_refund(&self, actor: &Actor, refund_id: &str) -> DbResult<Sale> {
        authorize(&self.db, actor, Capability::ReverseRefund)?;

        let mut tx = self.db.begin_write().await?;
        let existing = refund::fetch(&mut tx, refund_id)
            .await?
            .ok_or_else(|| CoreError::RefundNotFound(refund_id.to_string()))?;

        if let Some(batch_id) = &existing.batch_id {
            let returned_to = batch::fetch(&mut tx, batch_id)
                .await?
                .ok_or_else(|| CoreError::BatchNotFound(batch_id.clone()))?;
            ledger::decrement(
                &mut tx,
                &returned_to,
                existing.quantity,
                StockEntryType::Removed,
                &actor.user_id,
            )
            .await?;
        }

        payment::delete_for_refund(&mut tx, refund_id).await?;
        refund::delete(&mut tx, refund_id).await?;

        let items = sale::items(&mut tx, &existing.sale_id).await?;
        let refunded_ids = refund::refunded_item_ids(&mut tx, &existing.sale_id).await?;
        let all_refunded = !items.is_empty() && refunded_ids.len() == items.len();
        let updated = reproject_sale(&mut tx, &existing.sale_id, all_refunded).await?;

        tx.commit().await?;

        info!(
            refund_id = %refund_id,
            sale_id = %existing.sale_id,
            quantity = existing.quantity,
            "Refund reversed"
        );
        Ok(updated)
    }

    pub async fn refunds_for_sale(&self, sale_id: &str) -> DbResult<Vec<Refund>> {
        self.db.refunds().list_for_sale(sale_id).await
    }
}

async fn fetch_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Sale> {
    Ok(sale::fetch(conn, sale_id)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?)
}

/// Puts the item's stock back, writes the refund and its negative ledger row.
async fn write_refund(
    conn: &mut SqliteConnection,
    actor: &Actor,
    refunded: &Sale,
    item: &SaleItem,
    amount: Money,
    reason: Option<&str>,
) -> DbResult<Refund> {
    match &item.batch_id {
        Some(batch_id) => {
            let target = batch::fetch(conn, batch_id)
                .await?
                .ok_or_else(|| CoreError::BatchNotFound(batch_id.clone()))?;
            ledger::increment(conn, &target, item.quantity, StockEntryType::Returned, &actor.user_id).await?;
        }
        None => warn!(
            sale_item_id = %item.id,
            product_id = %item.product_id,
            "Refunded item has no batch, stock not restored"
        ),
    }

    let now = Utc::now();
    let created = Refund {
        id: Uuid::new_v4().to_string(),
        sale_id: refunded.id.clone(),
        sale_item_id: item.id.clone(),
        product_id: item.product_id.clone(),
        batch_id: item.batch_id.clone(),
        quantity: item.quantity,
        refund_amount_cents: amount.cents(),
        reason: reason.map(str::to_string),
        refunded_by: actor.user_id.clone(),
        refund_date: now,
    };
    refund::insert(conn, &created).await?;

    if amount.is_positive() {
        let reversal = Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: refunded.id.clone(),
            refund_id: Some(created.id.clone()),
            amount_cents: -amount.cents(),
            cashier_id: actor.user_id.clone(),
            payment_method: PaymentMethod::Refund,
            payment_date: now,
        };
        payment::insert(conn, &reversal).await?;
    }

    Ok(created)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin, batch_request, cashier, setup, stock_of, Fixture};
    use crate::workflow::NewDirectSale;
    use chrono::Duration;
    use duka_core::{Channel, ErrorKind, LineItem, PaymentStatus, SaleStatus};

    async fn sell(db: &Database, lines: Vec<LineItem>, paid_cents: i64) -> Sale {
        db.sales()
            .create_direct_sale(
                &cashier(),
                NewDirectSale {
                    sale_type: Channel::Retail,
                    customer: None,
                    items: lines,
                    discount_cents: 0,
                    paid_cents,
                    payment_method: PaymentMethod::Cash,
                },
            )
            .await
            .unwrap()
            .sale
    }

    /// Sale of 3 from B-001 and 2 from B-002 (same product), fully paid.
    async fn two_line_sale() -> (Database, Fixture, String, Sale) {
        let (db, fx) = setup(10).await;
        let second = db
            .inventory()
            .add_batch(&admin(), batch_request(&fx.product.id, "B-002", 10))
            .await
            .unwrap();
        let sale = sell(
            &db,
            vec![
                LineItem::new(&fx.product.id, &fx.batch.id, 3),
                LineItem::new(&fx.product.id, &second.id, 2),
            ],
            5000,
        )
        .await;
        (db, fx, second.id, sale)
    }

    #[tokio::test]
    async fn test_item_refund_restores_stock_and_books_reversal() {
        let (db, fx, second, sale) = two_line_sale().await;
        assert_eq!(stock_of(&db, &fx.batch.id).await, 7);

        let refunds = db.refund_workflow();
        let created = refunds
            .refund_item(&cashier(), &sale.id, &fx.product.id, 3, Some("damaged".into()))
            .await
            .unwrap();

        assert_eq!(created.refund_amount_cents, 3000);
        assert_eq!(created.batch_id.as_deref(), Some(fx.batch.id.as_str()));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 10);
        assert_eq!(stock_of(&db, &second).await, 8);

        let stored = db.sale_records().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.refund_total_cents, 3000);
        assert_eq!(stored.paid_cents, 5000);
        assert_eq!(stored.status, SaleStatus::Confirmed);

        let ledger = db.payments().list_for_sale(&sale.id).await.unwrap();
        let reversal = ledger.iter().find(|p| p.amount_cents < 0).unwrap();
        assert_eq!(reversal.amount_cents, -3000);
        assert_eq!(reversal.payment_method, PaymentMethod::Refund);
        assert_eq!(reversal.refund_id.as_deref(), Some(created.id.as_str()));

        let entries = db.inventory().stock_movements(&fx.batch.id).await.unwrap();
        assert_eq!(entries.last().unwrap().entry_type, StockEntryType::Returned);
    }

    #[tokio::test]
    async fn test_last_item_marks_sale_refunded() {
        let (db, fx, _, sale) = two_line_sale().await;
        let refunds = db.refund_workflow();

        refunds.refund_item(&cashier(), &sale.id, &fx.product.id, 3, None).await.unwrap();
        refunds.refund_item(&cashier(), &sale.id, &fx.product.id, 2, None).await.unwrap();

        let stored = db.sale_records().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SaleStatus::Refunded);
        assert_eq!(stored.payment_status, PaymentStatus::Refunded);
        assert_eq!(stored.refund_total_cents, 5000);

        let err = refunds
            .refund_item(&cashier(), &sale.id, &fx.product.id, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyRefunded(_))));
    }

    #[tokio::test]
    async fn test_partial_quantity_is_refused() {
        let (db, fx, _, sale) = two_line_sale().await;

        let err = db
            .refund_workflow()
            .refund_item(&cashier(), &sale.id, &fx.product.id, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::PartialRefundNotAllowed { requested: 1, .. })
        ));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 7);
        assert!(db.refunds().list_for_sale(&sale.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_item_window_expires() {
        let (db, fx) = setup(10).await;
        let sale = sell(&db, vec![LineItem::new(&fx.product.id, &fx.batch.id, 1)], 1000).await;

        sqlx::query("UPDATE sales SET date = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::days(11))
            .bind(&sale.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db
            .refund_workflow()
            .refund_item(&cashier(), &sale.id, &fx.product.id, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::RefundWindowExpired { window_days: 10, .. })
        ));

        // The whole-sale window is longer.
        let refunded = db
            .refund_workflow()
            .refund_sale(&cashier(), &sale.id, None)
            .await
            .unwrap();
        assert_eq!(refunded.status, SaleStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_then_reverse_restores_everything() {
        let (db, fx, _, sale) = two_line_sale().await;
        let refunds = db.refund_workflow();

        let created = refunds
            .refund_item(&cashier(), &sale.id, &fx.product.id, 3, None)
            .await
            .unwrap();
        let restored = refunds.reverse_refund(&admin(), &created.id).await.unwrap();

        assert_eq!(stock_of(&db, &fx.batch.id).await, 7);
        assert_eq!(restored.refund_total_cents, 0);
        assert_eq!(restored.paid_cents, 5000);
        assert_eq!(restored.status, SaleStatus::Confirmed);
        assert_eq!(restored.payment_status, PaymentStatus::Paid);
        assert!(refunds.refunds_for_sale(&sale.id).await.unwrap().is_empty());
        assert_eq!(db.payments().list_for_sale(&sale.id).await.unwrap().len(), 1);

        let err = refunds.reverse_refund(&admin(), &created.id).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::RefundNotFound(_))));
    }

    #[tokio::test]
    async fn test_reverse_needs_admin() {
        let (db, fx, _, sale) = two_line_sale().await;
        let created = db
            .refund_workflow()
            .refund_item(&cashier(), &sale.id, &fx.product.id, 3, None)
            .await
            .unwrap();

        let err = db
            .refund_workflow()
            .reverse_refund(&cashier(), &created.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_whole_sale_refund_hands_back_everything_paid() {
        let (db, fx) = setup(10).await;
        // 50.00 sale, 30.00 paid
        let sale = sell(&db, vec![LineItem::new(&fx.product.id, &fx.batch.id, 5)], 3000).await;

        let refunded = db
            .refund_workflow()
            .refund_sale(&cashier(), &sale.id, Some("wrong order".into()))
            .await
            .unwrap();

        assert_eq!(refunded.status, SaleStatus::Refunded);
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
        assert_eq!(refunded.refund_total_cents, refunded.paid_cents);
        assert_eq!(refunded.refund_total_cents, 3000);
        assert!(refunded.is_loan);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 10);

        let err = db
            .refund_workflow()
            .refund_sale(&cashier(), &sale.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyRefunded(_))));

        let err = db
            .loans()
            .pay_loan(&cashier(), &sale.id, Money::from_cents(100), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyRefunded(_))));
    }

    #[tokio::test]
    async fn test_unpaid_sale_cannot_be_refunded() {
        let (db, fx) = setup(10).await;
        let sale = sell(&db, vec![LineItem::new(&fx.product.id, &fx.batch.id, 2)], 0).await;

        let err = db
            .refund_workflow()
            .refund_sale(&cashier(), &sale.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::NotPaid(_))));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 8);
    }

    #[tokio::test]
    async fn test_product_not_in_sale() {
        let (db, _, _, sale) = two_line_sale().await;

        let err = db
            .refund_workflow()
            .refund_item(&cashier(), &sale.id, "other-product", 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::ProductNotInSale { .. })));
    }
}
