//! # Sale Finalization
//!
//! Both ways a sale comes into existence, order confirmation and walk-in
//! sales, end in [`finalize_sale`]. It runs inside the caller's
//! transaction.
//!
//! ## Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► batch required (BatchMissing) ──► batch exists              │
//! │        ──► batch.product == line.product (BatchMismatch)               │
//! │        ──► unit price = resolve_price(batch, channel)                  │
//! │                                                                         │
//! │  totals: total = Σ qty × price, final = max(total − discount, 0)       │
//! │  tender: recorded = min(paid, final), change = paid − recorded         │
//! │                                  ── nothing written up to here ──      │
//! │  ledger::decrement for every line (InsufficientStock aborts all)       │
//! │  INSERT sale, sale_items                                                │
//! │  INSERT payment (if recorded > 0)                                      │
//! │  reproject: paid, payment_status, is_loan from the ledger              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{authorize, check_customer, reproject_sale, resolve_customer, RetailCustomer};
use crate::error::DbResult;
use crate::ledger;
use crate::pool::Database;
use crate::repository::{batch, payment, sale};
use duka_core::pricing::price_line;
use duka_core::settlement::{derive_payment_status, is_loan, settle_tender, PricedLine, SaleTotals};
use duka_core::validation::{validate_line_count, validate_quantity};
use duka_core::{
    Actor, Capability, Channel, CoreError, CustomerRef, FinalizedSale, LineItem, Money, Payment,
    PaymentMethod, ProductBatch, Sale, SaleItem, SaleStatus, StockEntryType,
};

// =============================================================================
// Finalization Engine
// =============================================================================

/// What happens when the discount is larger than the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscountRule {
    /// Refuse with `DiscountExceedsSubtotal` (walk-in sales).
    MustFitTotal,
    /// Clamp the final amount at zero (order confirmation).
    ClampToZero,
}

pub(crate) struct SaleDraft<'a> {
    pub order_id: Option<&'a str>,
    pub actor: &'a Actor,
    pub customer_id: Option<String>,
    pub channel: Channel,
    pub lines: &'a [LineItem],
    pub discount: Money,
    pub discount_rule: DiscountRule,
    pub payment_method: PaymentMethod,
    pub tendered: Money,
}

/// Resolves batches and prices for `lines` without writing anything.
pub(crate) async fn price_lines(
    conn: &mut SqliteConnection,
    channel: Channel,
    lines: &[LineItem],
) -> DbResult<Vec<(PricedLine, ProductBatch)>> {
    validate_line_count(lines.len())?;

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;

        let batch_id = line
            .batch_id
            .as_deref()
            .ok_or_else(|| CoreError::BatchMissing {
                product_id: line.product_id.clone(),
            })?;

        let batch = batch::fetch(conn, batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(batch_id.to_string()))?;

        let unit_price = price_line(&batch, &line.product_id, channel)?;
        priced.push((
            PricedLine {
                product_id: line.product_id.clone(),
                batch_id: batch.id.clone(),
                quantity: line.quantity,
                unit_price,
            },
            batch,
        ));
    }

    Ok(priced)
}

/// Turns a draft into a persisted sale. Runs inside the caller's
/// transaction; any error leaves the transaction to be rolled back.
pub(crate) async fn finalize_sale(conn: &mut SqliteConnection, draft: SaleDraft<'_>) -> DbResult<FinalizedSale> {
    let priced = price_lines(conn, draft.channel, draft.lines).await?;
    let lines: Vec<PricedLine> = priced.iter().map(|(line, _)| line.clone()).collect();

    let totals = SaleTotals::compute(&lines, draft.discount)?;
    if draft.discount_rule == DiscountRule::MustFitTotal {
        totals.ensure_discount_within_total()?;
    }
    let tender = settle_tender(totals.final_amount, draft.tendered)?;

    let cashier = draft.actor.user_id.as_str();
    for (line, batch) in &priced {
        ledger::decrement(conn, batch, line.quantity, StockEntryType::Removed, cashier).await?;
    }

    let now = Utc::now();
    let initial_status = derive_payment_status(Money::zero(), totals.final_amount);
    let new_sale = Sale {
        id: Uuid::new_v4().to_string(),
        order_id: draft.order_id.map(str::to_string),
        user_id: cashier.to_string(),
        customer_id: draft.customer_id,
        sale_type: draft.channel,
        status: SaleStatus::Confirmed,
        payment_status: initial_status,
        is_loan: is_loan(initial_status),
        total_cents: totals.total.cents(),
        discount_cents: totals.discount.cents(),
        final_cents: totals.final_amount.cents(),
        paid_cents: 0,
        refund_total_cents: 0,
        payment_method: draft.payment_method,
        date: now,
    };
    sale::insert(conn, &new_sale).await?;

    let mut items = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: new_sale.id.clone(),
            product_id: line.product_id.clone(),
            batch_id: Some(line.batch_id.clone()),
            quantity: line.quantity,
            price_per_unit_cents: line.unit_price.cents(),
            total_price_cents: line.line_total().cents(),
        };
        sale::insert_item(conn, &item, position).await?;
        items.push(item);
    }

    if tender.recorded.is_positive() {
        let received = Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: new_sale.id.clone(),
            refund_id: None,
            amount_cents: tender.recorded.cents(),
            cashier_id: cashier.to_string(),
            payment_method: draft.payment_method,
            payment_date: now,
        };
        payment::insert(conn, &received).await?;
    }

    let finalized = reproject_sale(conn, &new_sale.id, false).await?;

    Ok(FinalizedSale {
        sale: finalized,
        items,
        change_due_cents: tender.change_due.cents(),
    })
}

// =============================================================================
// Walk-in Sales
// =============================================================================

/// A walk-in sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDirectSale {
    pub sale_type: Channel,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount_cents: i64,
    /// Amount handed over at the till.
    #[serde(default)]
    pub paid_cents: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Walk-in sales, created without an order.
#[derive(Debug, Clone)]
pub struct SaleWorkflow {
    db: Database,
}

impl SaleWorkflow {
    pub fn new(db: Database) -> Self {
        SaleWorkflow { db }
    }

    /// Creates and finalizes a walk-in sale in one transaction.
    ///
    /// ## Errors
    /// - `WholesaleCustomerRequired` for wholesale without a customer
    /// - `DiscountExceedsSubtotal` when the discount is above the total
    /// - `BatchMissing` / `BatchMismatch` / `InsufficientStock` per line
    pub async fn create_direct_sale(&self, actor: &Actor, request: NewDirectSale) -> DbResult<FinalizedSale> {
        authorize(&self.db, actor, Capability::CreateSale)?;
        check_customer(request.sale_type, request.customer.as_ref())?;
        validate_line_count(request.items.len())?;

        let mut tx = self.db.begin_write().await?;

        let customer_id = resolve_customer(
            &mut tx,
            request.sale_type,
            request.customer.as_ref(),
            RetailCustomer::Drop,
        )
        .await?;

        let finalized = finalize_sale(
            &mut tx,
            SaleDraft {
                order_id: None,
                actor,
                customer_id,
                channel: request.sale_type,
                lines: &request.items,
                discount: Money::from_cents(request.discount_cents),
                discount_rule: DiscountRule::MustFitTotal,
                payment_method: request.payment_method,
                tendered: Money::from_cents(request.paid_cents),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            sale_id = %finalized.sale.id,
            final_amount = %finalized.sale.final_amount(),
            payment_status = %finalized.sale.payment_status,
            "Direct sale created"
        );
        Ok(finalized)
    }

    /// A sale with its items.
    pub async fn get(&self, sale_id: &str) -> DbResult<FinalizedSale> {
        let mut conn = self.db.pool().acquire().await?;
        let found = sale::fetch(&mut conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = sale::items(&mut conn, sale_id).await?;

        Ok(FinalizedSale {
            sale: found,
            items,
            change_due_cents: 0,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin, batch_request, cashier, setup, staff, stock_of};
    use duka_core::{ErrorKind, PaymentStatus, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

    fn retail_sale(items: Vec<LineItem>, paid_cents: i64) -> NewDirectSale {
        NewDirectSale {
            sale_type: Channel::Retail,
            customer: None,
            items,
            discount_cents: 0,
            paid_cents,
            payment_method: PaymentMethod::Cash,
        }
    }

    #[tokio::test]
    async fn test_direct_sale_decrements_and_records_payment() {
        let (db, fx) = setup(10).await;

        let result = db
            .sales()
            .create_direct_sale(
                &cashier(),
                retail_sale(vec![LineItem::new(&fx.product.id, &fx.batch.id, 3)], 5000),
            )
            .await
            .unwrap();

        // selling price 10.00 × 3
        assert_eq!(result.sale.total_cents, 3000);
        assert_eq!(result.sale.final_cents, 3000);
        assert_eq!(result.sale.paid_cents, 3000);
        assert_eq!(result.change_due_cents, 2000);
        assert_eq!(result.sale.payment_status, PaymentStatus::Paid);
        assert!(!result.sale.is_loan);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 7);

        let ledger = db.payments().list_for_sale(&result.sale.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount_cents, 3000);
    }

    #[tokio::test]
    async fn test_wholesale_uses_wholesale_price_and_creates_customer() {
        let (db, fx) = setup(10).await;

        let request = NewDirectSale {
            sale_type: Channel::Wholesale,
            customer: Some(CustomerRef::New {
                name: "Duka la Mama".into(),
                phone: "0712345678".into(),
            }),
            items: vec![LineItem::new(&fx.product.id, &fx.batch.id, 2)],
            discount_cents: 0,
            paid_cents: 0,
            payment_method: PaymentMethod::Cash,
        };

        let result = db.sales().create_direct_sale(&cashier(), request).await.unwrap();

        // wholesale price 8.00 × 2, nothing paid
        assert_eq!(result.sale.final_cents, 1600);
        assert_eq!(result.sale.payment_status, PaymentStatus::NotPaid);
        assert!(result.sale.is_loan);

        let customer = db.customers().find_by_phone("0712345678").await.unwrap().unwrap();
        assert_eq!(result.sale.customer_id.as_deref(), Some(customer.id.as_str()));
    }

    #[tokio::test]
    async fn test_wholesale_without_customer_is_refused() {
        let (db, fx) = setup(10).await;

        let mut request = retail_sale(vec![LineItem::new(&fx.product.id, &fx.batch.id, 1)], 0);
        request.sale_type = Channel::Wholesale;

        let err = db.sales().create_direct_sale(&cashier(), request).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::WholesaleCustomerRequired)));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 10);
    }

    #[tokio::test]
    async fn test_largest_accepted_line_totals_without_overflow() {
        let (db, fx) = setup(1).await;

        let mut request = batch_request(&fx.product.id, "B-MAX", MAX_ITEM_QUANTITY);
        request.selling_price_cents = MAX_PRICE_CENTS;
        let batch = db.inventory().add_batch(&admin(), request).await.unwrap();

        let created = db
            .sales()
            .create_direct_sale(
                &cashier(),
                retail_sale(
                    vec![LineItem::new(&fx.product.id, &batch.id, MAX_ITEM_QUANTITY)],
                    0,
                ),
            )
            .await
            .unwrap();

        assert_eq!(created.sale.total_cents, MAX_PRICE_CENTS * MAX_ITEM_QUANTITY);
        assert_eq!(created.sale.payment_status, PaymentStatus::NotPaid);
        assert_eq!(stock_of(&db, &batch.id).await, 0);
    }

    #[tokio::test]
    async fn test_discount_above_total_is_refused() {
        let (db, fx) = setup(10).await;

        let mut request = retail_sale(vec![LineItem::new(&fx.product.id, &fx.batch.id, 1)], 0);
        request.discount_cents = 1001;

        let err = db.sales().create_direct_sale(&cashier(), request).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::DiscountExceedsSubtotal { .. })));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 10);
    }

    #[tokio::test]
    async fn test_line_without_batch_is_refused() {
        let (db, fx) = setup(10).await;

        let line = LineItem {
            product_id: fx.product.id.clone(),
            batch_id: None,
            quantity: 1,
        };
        let err = db
            .sales()
            .create_direct_sale(&cashier(), retail_sale(vec![line], 0))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::BatchMissing { .. })));
    }

    #[tokio::test]
    async fn test_batch_of_other_product_is_refused() {
        let (db, fx) = setup(10).await;

        let line = LineItem::new("some-other-product", &fx.batch.id, 1);
        let err = db
            .sales()
            .create_direct_sale(&cashier(), retail_sale(vec![line], 0))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::BatchMismatch { .. })));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_one_short_line_rolls_back_every_line() {
        let (db, fx) = setup(10).await;

        let second = db
            .inventory()
            .add_batch(&admin(), crate::test_support::batch_request(&fx.product.id, "B-002", 2))
            .await
            .unwrap();

        let items = vec![
            LineItem::new(&fx.product.id, &fx.batch.id, 4),
            LineItem::new(&fx.product.id, &second.id, 3),
        ];
        let err = db
            .sales()
            .create_direct_sale(&cashier(), retail_sale(items, 0))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(stock_of(&db, &fx.batch.id).await, 10);
        assert_eq!(stock_of(&db, &second.id).await, 2);

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    #[tokio::test]
    async fn test_staff_cannot_sell() {
        let (db, fx) = setup(10).await;

        let err = db
            .sales()
            .create_direct_sale(
                &staff(),
                retail_sale(vec![LineItem::new(&fx.product.id, &fx.batch.id, 1)], 0),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let (db, path) = crate::test_support::file_db().await;
        let fx = crate::test_support::product_with_batch(&db, 5).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let db = db.clone();
            let items = vec![LineItem::new(&fx.product.id, &fx.batch.id, 5)];
            handles.push(tokio::spawn(async move {
                db.sales()
                    .create_direct_sale(&cashier(), retail_sale(items, 0))
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
        assert_eq!(losers[0].kind(), ErrorKind::ResourceExhausted);
        assert!(matches!(losers[0].as_domain(), Some(CoreError::InsufficientStock { .. })));
        assert_eq!(stock_of(&db, &fx.batch.id).await, 0);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
