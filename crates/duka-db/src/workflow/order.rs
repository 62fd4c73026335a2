//! # Order Workflow
//!
//! Orders are requests for goods that do not touch stock until a cashier
//! confirms them. Every status change is a compare-and-set on the order
//! row, so two cashiers racing on the same order cannot both win.
//!
//! ## Confirmation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    fetch order ──────────────────────────► OrderNotFound                │
//! │    transition(status, Confirm) ──────────► AlreadyProcessed             │
//! │    UPDATE orders SET status = 'confirmed'                               │
//! │      WHERE id = ? AND status IN ('pending', 'updated')                  │
//! │      rows = 0 ──► re-read, AlreadyProcessed                             │
//! │    finalize_sale(order items, order discount)                           │
//! │      BatchMissing / BatchMismatch / InsufficientStock ──► ROLLBACK      │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::sale::{finalize_sale, price_lines, DiscountRule, SaleDraft};
use super::{authorize, check_customer, resolve_customer, RetailCustomer};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::order;
use duka_core::order::{transition, OrderAction, Transition};
use duka_core::validation::{validate_line_count, validate_note};
use duka_core::{
    Actor, Capability, Channel, CoreError, CustomerRef, FinalizedSale, LineItem, Money, Order,
    OrderDetails, OrderItem, OrderStatus, PaymentMethod, ValidationError,
};

/// An order as submitted by staff. Also used to replace the contents of a
/// rejected or updated order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_type: Channel,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub discount_cents: i64,
}

impl NewOrder {
    fn validate(&self) -> DbResult<()> {
        validate_line_count(self.items.len())?;
        validate_note("notes", self.notes.as_deref())?;
        if self.discount_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "discount".to_string(),
            }
            .into());
        }
        check_customer(self.order_type, self.customer.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct OrderWorkflow {
    db: Database,
}

impl OrderWorkflow {
    pub fn new(db: Database) -> Self {
        OrderWorkflow { db }
    }

    /// Creates a pending order with prices snapshotted from the batches.
    /// Stock is not touched.
    pub async fn create_order(&self, actor: &Actor, request: NewOrder) -> DbResult<OrderDetails> {
        authorize(&self.db, actor, Capability::CreateOrder)?;
        request.validate()?;

        let mut tx = self.db.begin_write().await?;

        let customer_id = resolve_customer(
            &mut tx,
            request.order_type,
            request.customer.as_ref(),
            RetailCustomer::Keep,
        )
        .await?;

        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            customer_id,
            order_type: request.order_type,
            status: OrderStatus::Pending,
            notes: request.notes.clone(),
            discount_cents: request.discount_cents,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        // Price first so a bad line fails before the order row exists.
        let items = write_items(&mut tx, &created.id, created.order_type, &request.items, false).await?;
        order::insert(&mut tx, &created).await?;
        for (position, item) in items.iter().enumerate() {
            order::insert_item(&mut tx, item, position).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %created.id,
            order_type = %created.order_type,
            items = items.len(),
            "Order created"
        );
        Ok(OrderDetails { order: created, items })
    }

    /// Replaces the items and header of a rejected or updated order.
    /// The status stays where it is.
    pub async fn update_order(&self, actor: &Actor, order_id: &str, request: NewOrder) -> DbResult<OrderDetails> {
        authorize(&self.db, actor, Capability::UpdateOrder)?;
        request.validate()?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_order(&mut tx, order_id).await?;
        apply(&mut tx, &current, OrderAction::Update).await?;

        let customer_id = resolve_customer(
            &mut tx,
            request.order_type,
            request.customer.as_ref(),
            RetailCustomer::Keep,
        )
        .await?;

        order::update_header(
            &mut tx,
            order_id,
            request.order_type,
            customer_id.as_deref(),
            request.notes.as_deref(),
            request.discount_cents,
            Utc::now(),
        )
        .await?;

        let items = write_items(&mut tx, order_id, request.order_type, &request.items, true).await?;

        let updated = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, items = items.len(), "Order updated");
        Ok(OrderDetails { order: updated, items })
    }

    /// Rejects a pending or updated order, keeping the reason on the row.
    pub async fn reject_order(&self, actor: &Actor, order_id: &str, reason: Option<String>) -> DbResult<Order> {
        authorize(&self.db, actor, Capability::RejectOrder)?;
        validate_note("reason", reason.as_deref())?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_order(&mut tx, order_id).await?;
        apply(&mut tx, &current, OrderAction::Reject).await?;
        order::set_rejection_reason(&mut tx, order_id, reason.as_deref()).await?;
        let rejected = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, reason = ?reason, "Order rejected");
        Ok(rejected)
    }

    /// Sends a rejected order back for confirmation as `updated`.
    pub async fn resend_order(&self, actor: &Actor, order_id: &str) -> DbResult<Order> {
        authorize(&self.db, actor, Capability::ResendOrder)?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_order(&mut tx, order_id).await?;
        apply(&mut tx, &current, OrderAction::Resend).await?;
        let resent = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, "Order resent");
        Ok(resent)
    }

    /// Removes a rejected order and its items.
    pub async fn delete_order(&self, actor: &Actor, order_id: &str) -> DbResult<()> {
        authorize(&self.db, actor, Capability::DeleteOrder)?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_order(&mut tx, order_id).await?;
        // Takes the write lock while the order is still rejected.
        apply(&mut tx, &current, OrderAction::Delete).await?;
        order::delete(&mut tx, order_id).await?;

        tx.commit().await?;

        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    /// Confirms an order and turns it into a sale.
    ///
    /// Prices are resolved from the batches again at confirmation; the
    /// order's own snapshot is left alone. The order discount is clamped so
    /// the final amount never drops below zero.
    ///
    /// ## Errors
    /// - `OrderNotFound`
    /// - `AlreadyProcessed` when the order is not pending/updated, including
    ///   when another confirmation won the race
    /// - `BatchMissing` / `BatchMismatch` / `InsufficientStock` per line
    pub async fn confirm_order(
        &self,
        actor: &Actor,
        order_id: &str,
        payment_method: PaymentMethod,
        amount_paid: Money,
    ) -> DbResult<FinalizedSale> {
        authorize(&self.db, actor, Capability::ConfirmOrder)?;

        let mut tx = self.db.begin_write().await?;
        let current = fetch_order(&mut tx, order_id).await?;
        apply(&mut tx, &current, OrderAction::Confirm).await?;

        let lines: Vec<LineItem> = order::items(&mut tx, order_id)
            .await?
            .into_iter()
            .map(|item| LineItem {
                product_id: item.product_id,
                batch_id: Some(item.batch_id),
                quantity: item.quantity,
            })
            .collect();

        let finalized = finalize_sale(
            &mut tx,
            SaleDraft {
                order_id: Some(order_id),
                actor,
                customer_id: current.customer_id.clone(),
                channel: current.order_type,
                lines: &lines,
                discount: Money::from_cents(current.discount_cents),
                discount_rule: DiscountRule::ClampToZero,
                payment_method,
                tendered: amount_paid,
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            from = %current.status,
            sale_id = %finalized.sale.id,
            final_amount = %finalized.sale.final_amount(),
            payment_status = %finalized.sale.payment_status,
            "Order confirmed"
        );
        Ok(finalized)
    }

    /// An order with its items.
    pub async fn get(&self, order_id: &str) -> DbResult<OrderDetails> {
        let mut conn = self.db.pool().acquire().await?;
        let found = fetch_order(&mut conn, order_id).await?;
        let items = order::items(&mut conn, order_id).await?;
        Ok(OrderDetails { order: found, items })
    }
}

/// Checks `action` against the state machine and moves the row with a
/// compare-and-set. Actions that keep the status guard on the status that
/// was read.
async fn apply(conn: &mut SqliteConnection, current: &Order, action: OrderAction) -> DbResult<()> {
    let target = match transition(&current.id, current.status, action)? {
        Transition::To(status) => status,
        Transition::Delete => current.status,
    };
    let from = if target == current.status {
        std::slice::from_ref(&current.status)
    } else {
        action.allowed_from()
    };

    if !order::set_status(conn, &current.id, from, target, Utc::now()).await? {
        return Err(stale_transition(conn, &current.id, action).await);
    }
    Ok(())
}

async fn fetch_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    Ok(order::fetch(conn, order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?)
}

/// Error for a compare-and-set that lost to another writer: the state
/// machine's refusal for whatever status the row has now.
async fn stale_transition(conn: &mut SqliteConnection, order_id: &str, action: OrderAction) -> DbError {
    match fetch_order(conn, order_id).await {
        Ok(now) => match transition(order_id, now.status, action) {
            Err(err) => err.into(),
            Ok(_) => CoreError::InvalidOrderTransition {
                order_id: order_id.to_string(),
                action: action.as_str().to_string(),
                status: now.status.to_string(),
            }
            .into(),
        },
        Err(err) => err,
    }
}

/// Prices `lines` for `channel` and, when `replace` is set, swaps them in
/// for the order's current items.
async fn write_items(
    conn: &mut SqliteConnection,
    order_id: &str,
    channel: Channel,
    lines: &[LineItem],
    replace: bool,
) -> DbResult<Vec<OrderItem>> {
    let priced = price_lines(conn, channel, lines).await?;
    let items: Vec<OrderItem> = priced
        .into_iter()
        .map(|(line, _)| OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: line.product_id,
            batch_id: line.batch_id,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
        })
        .collect();

    if replace {
        order::delete_items(conn, order_id).await?;
        for (position, item) in items.iter().enumerate() {
            order::insert_item(conn, item, position).await?;
        }
    }

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin, cashier, setup, staff, stock_of};
    use duka_core::{ErrorKind, PaymentStatus, SaleStatus};

    fn order_of(product_id: &str, batch_id: &str, quantity: i64) -> NewOrder {
        NewOrder {
            order_type: Channel::Retail,
            customer: None,
            items: vec![LineItem::new(product_id, batch_id, quantity)],
            notes: None,
            discount_cents: 0,
        }
    }

    #[tokio::test]
    async fn test_create_order_snapshots_price_without_touching_stock() {
        let (db, fx) = setup(10).await;

        let created = db
            .orders()
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 4))
            .await
            .unwrap();

        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].unit_price_cents, 1000);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 10);

        let loaded = db.orders().get(&created.order.id).await.unwrap();
        assert_eq!(loaded.items, created.items);
    }

    #[tokio::test]
    async fn test_wholesale_order_needs_customer() {
        let (db, fx) = setup(10).await;
        let mut request = order_of(&fx.product.id, &fx.batch.id, 1);
        request.order_type = Channel::Wholesale;

        let err = db.orders().create_order(&staff(), request.clone()).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::WholesaleCustomerRequired)));

        request.customer = Some(CustomerRef::New {
            name: "Mama Ntilie".into(),
            phone: "0712345678".into(),
        });
        let created = db.orders().create_order(&staff(), request).await.unwrap();
        assert!(created.order.customer_id.is_some());
        assert_eq!(created.items[0].unit_price_cents, 800);
    }

    #[tokio::test]
    async fn test_confirm_consumes_stock_exactly() {
        let (db, fx) = setup(10).await;
        let created = db
            .orders()
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 10))
            .await
            .unwrap();

        let sale = db
            .orders()
            .confirm_order(&cashier(), &created.order.id, PaymentMethod::Cash, Money::from_cents(10000))
            .await
            .unwrap();

        assert_eq!(stock_of(&db, &fx.batch.id).await, 0);
        assert_eq!(sale.sale.order_id.as_deref(), Some(created.order.id.as_str()));
        assert_eq!(sale.sale.status, SaleStatus::Confirmed);
        assert_eq!(sale.sale.payment_status, PaymentStatus::Paid);

        let order = db.orders().get(&created.order.id).await.unwrap().order;
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_confirm_with_short_stock_rolls_back() {
        let (db, fx) = setup(5).await;
        let created = db
            .orders()
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 10))
            .await
            .unwrap();

        let err = db
            .orders()
            .confirm_order(&cashier(), &created.order.id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { available: 5, requested: 10, .. })
        ));
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 5);

        let order = db.orders().get(&created.order.id).await.unwrap().order;
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(db.sale_records().get_by_order(&created.order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirm_twice_is_already_processed() {
        let (db, fx) = setup(10).await;
        let created = db
            .orders()
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 2))
            .await
            .unwrap();

        db.orders()
            .confirm_order(&cashier(), &created.order.id, PaymentMethod::Cash, Money::from_cents(2000))
            .await
            .unwrap();
        let err = db
            .orders()
            .confirm_order(&cashier(), &created.order.id, PaymentMethod::Cash, Money::from_cents(2000))
            .await
            .unwrap_err();

        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyProcessed { .. })));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 8);
    }

    #[tokio::test]
    async fn test_concurrent_confirms_leave_one_sale() {
        let (db, path) = crate::test_support::file_db().await;
        let fx = crate::test_support::product_with_batch(&db, 10).await;
        let created = db
            .orders()
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 3))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let db = db.clone();
            let order_id = created.order.id.clone();
            handles.push(tokio::spawn(async move {
                db.orders()
                    .confirm_order(&cashier(), &order_id, PaymentMethod::Cash, Money::from_cents(3000))
                    .await
            }));
        }

        let mut successes = 0;
        let mut losers = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => losers.push(err),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(losers.len(), 1);
        assert!(matches!(losers[0].as_domain(), Some(CoreError::AlreadyProcessed { .. })));
        assert_eq!(losers[0].kind(), ErrorKind::StateConflict);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 7);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_confirm_unknown_order() {
        let (db, _) = setup(1).await;

        let err = db
            .orders()
            .confirm_order(&cashier(), "missing", PaymentMethod::Cash, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_reject_resend_confirm() {
        let (db, fx) = setup(10).await;
        let orders = db.orders();
        let created = orders
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 3))
            .await
            .unwrap();
        let id = created.order.id.as_str();

        let rejected = orders
            .reject_order(&cashier(), id, Some("customer left".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, OrderStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("customer left"));

        let err = orders
            .confirm_order(&cashier(), id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::AlreadyProcessed { .. })));

        let resent = orders.resend_order(&staff(), id).await.unwrap();
        assert_eq!(resent.status, OrderStatus::Updated);

        let sale = orders
            .confirm_order(&cashier(), id, PaymentMethod::MobileMoney, Money::from_cents(1000))
            .await
            .unwrap();
        assert_eq!(sale.sale.payment_status, PaymentStatus::Partial);
        assert!(sale.sale.is_loan);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 7);
    }

    #[tokio::test]
    async fn test_update_replaces_items() {
        let (db, fx) = setup(10).await;
        let orders = db.orders();
        let created = orders
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 3))
            .await
            .unwrap();
        let id = created.order.id.as_str();

        let err = orders
            .update_order(&staff(), id, order_of(&fx.product.id, &fx.batch.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidOrderTransition { .. })));

        orders.reject_order(&cashier(), id, None).await.unwrap();

        let mut replacement = order_of(&fx.product.id, &fx.batch.id, 6);
        replacement.notes = Some("bigger pack".into());
        replacement.discount_cents = 500;
        let updated = orders.update_order(&staff(), id, replacement).await.unwrap();

        assert_eq!(updated.order.status, OrderStatus::Rejected);
        assert_eq!(updated.order.discount_cents, 500);
        assert_eq!(updated.order.notes.as_deref(), Some("bigger pack"));
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].quantity, 6);
        assert_eq!(orders.get(id).await.unwrap().items, updated.items);
    }

    #[tokio::test]
    async fn test_discount_above_total_is_clamped_on_confirm() {
        let (db, fx) = setup(10).await;
        let mut request = order_of(&fx.product.id, &fx.batch.id, 1);
        request.discount_cents = 5000;

        let created = db.orders().create_order(&staff(), request).await.unwrap();
        let sale = db
            .orders()
            .confirm_order(&cashier(), &created.order.id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();

        assert_eq!(sale.sale.total_cents, 1000);
        assert_eq!(sale.sale.final_cents, 0);
        assert_eq!(sale.sale.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_delete_only_when_rejected() {
        let (db, fx) = setup(10).await;
        let orders = db.orders();
        let created = orders
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 1))
            .await
            .unwrap();
        let id = created.order.id.as_str();

        let err = orders.delete_order(&staff(), id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        orders.reject_order(&admin(), id, None).await.unwrap();
        orders.delete_order(&staff(), id).await.unwrap();

        let err = orders.get(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.order_records().get_items(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_from_other_product_is_rejected() {
        let (db, fx) = setup(10).await;

        let err = db
            .orders()
            .create_order(&staff(), order_of("another-product", &fx.batch.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::BatchMismatch { .. })));
        assert!(db
            .order_records()
            .list_by_status(OrderStatus::Pending)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_roles() {
        let (db, fx) = setup(10).await;
        let created = db
            .orders()
            .create_order(&staff(), order_of(&fx.product.id, &fx.batch.id, 1))
            .await
            .unwrap();

        let err = db
            .orders()
            .confirm_order(&staff(), &created.order.id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = db
            .orders()
            .create_order(&cashier(), order_of(&fx.product.id, &fx.batch.id, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
