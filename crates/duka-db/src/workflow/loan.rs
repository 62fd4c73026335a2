//! # Loan Workflow
//!
//! Repayments against sales that left the till unpaid or partly paid. Each
//! payment is a ledger row; the sale's `paid` and status are projected from
//! the ledger in the same transaction.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{authorize, reproject_sale};
use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::{payment, sale};
use duka_core::loan::check_loan_payment;
use duka_core::{Actor, Capability, CoreError, Money, Payment, PaymentMethod, Sale};

#[derive(Debug, Clone)]
pub struct LoanWorkflow {
    db: Database,
}

impl LoanWorkflow {
    pub fn new(db: Database) -> Self {
        LoanWorkflow { db }
    }

    /// Records a repayment of `amount`.
    ///
    /// ## Errors
    /// - `InvalidAmount` when `amount <= 0`
    /// - `OverpaymentError` when `amount` is above the outstanding balance
    /// - `AlreadyRefunded` for refunded sales
    pub async fn pay_loan(
        &self,
        actor: &Actor,
        sale_id: &str,
        amount: Money,
        payment_method: PaymentMethod,
    ) -> DbResult<Sale> {
        authorize(&self.db, actor, Capability::RecordPayment)?;

        let mut tx = self.db.begin_write().await?;
        let current = sale::fetch(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        let accepted = check_loan_payment(&current, amount)?;

        let received = Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            refund_id: None,
            amount_cents: accepted.amount.cents(),
            cashier_id: actor.user_id.clone(),
            payment_method,
            payment_date: Utc::now(),
        };
        payment::insert(&mut tx, &received).await?;

        let updated = reproject_sale(&mut tx, sale_id, false).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            amount = %accepted.amount,
            paid = %updated.paid(),
            payment_status = %updated.payment_status,
            "Loan payment recorded"
        );
        Ok(updated)
    }

    /// Sales still owing money, oldest first.
    pub async fn open_loans(&self) -> DbResult<Vec<Sale>> {
        self.db.sale_records().open_loans().await
    }

    /// The full payment ledger of a sale, refund reversals included.
    pub async fn payments_for_sale(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        self.db.payments().list_for_sale(sale_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cashier, setup, staff};
    use crate::workflow::NewDirectSale;
    use duka_core::{Channel, ErrorKind, LineItem, PaymentStatus};

    /// A 100.00 sale (10 × 10.00) with `paid_cents` handed over.
    async fn loan_sale(paid_cents: i64) -> (Database, Sale) {
        let (db, fx) = setup(20).await;
        let created = db
            .sales()
            .create_direct_sale(
                &cashier(),
                NewDirectSale {
                    sale_type: Channel::Retail,
                    customer: None,
                    items: vec![LineItem::new(&fx.product.id, &fx.batch.id, 10)],
                    discount_cents: 0,
                    paid_cents,
                    payment_method: PaymentMethod::Cash,
                },
            )
            .await
            .unwrap();
        (db, created.sale)
    }

    #[tokio::test]
    async fn test_pay_down_to_paid() {
        let (db, sale) = loan_sale(4000).await;
        assert_eq!(sale.payment_status, PaymentStatus::Partial);
        assert!(sale.is_loan);

        let loans = db.loans();
        assert_eq!(loans.open_loans().await.unwrap().len(), 1);

        let updated = loans
            .pay_loan(&cashier(), &sale.id, Money::from_cents(6000), PaymentMethod::MobileMoney)
            .await
            .unwrap();
        assert_eq!(updated.paid_cents, 10000);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert!(!updated.is_loan);
        assert!(loans.open_loans().await.unwrap().is_empty());

        let ledger = loans.payments_for_sale(&sale.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[1].payment_method, PaymentMethod::MobileMoney);
        assert_eq!(ledger[1].cashier_id, "cashier-1");
    }

    #[tokio::test]
    async fn test_overpayment_and_zero_are_refused() {
        let (db, sale) = loan_sale(4000).await;
        let loans = db.loans();

        let err = loans
            .pay_loan(&cashier(), &sale.id, Money::from_cents(6001), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::OverpaymentError { .. })));

        let err = loans
            .pay_loan(&cashier(), &sale.id, Money::zero(), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InvalidAmount { .. })));

        loans
            .pay_loan(&cashier(), &sale.id, Money::from_cents(6000), PaymentMethod::Cash)
            .await
            .unwrap();
        let err = loans
            .pay_loan(&cashier(), &sale.id, Money::from_cents(1), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

        let stored = db.sale_records().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.paid_cents, 10000);
    }

    #[tokio::test]
    async fn test_unpaid_sale_becomes_partial() {
        let (db, sale) = loan_sale(0).await;
        assert_eq!(sale.payment_status, PaymentStatus::NotPaid);

        let updated = db
            .loans()
            .pay_loan(&cashier(), &sale.id, Money::from_cents(2500), PaymentMethod::Cash)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Partial);
        assert!(updated.is_loan);
    }

    #[tokio::test]
    async fn test_unknown_sale_and_roles() {
        let (db, sale) = loan_sale(0).await;

        let err = db
            .loans()
            .pay_loan(&cashier(), "missing", Money::from_cents(100), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::SaleNotFound(_))));

        let err = db
            .loans()
            .pay_loan(&staff(), &sale.id, Money::from_cents(100), PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
