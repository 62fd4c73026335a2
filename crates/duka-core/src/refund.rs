//! # Refund Rules
//!
//! Eligibility, item selection and amount allocation for refunds. The
//! database layer applies the resulting plan (stock back into batches,
//! negative payment rows, sale status) inside one transaction.
//!
//! ## Two Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refund_item(sale, product, qty)        refund_sale(sale)               │
//! │  ─────────────────────────────          ─────────────────               │
//! │  window: item_window_days (10)          window: sale_window_days (50)   │
//! │  qty must equal sold qty                every unrefunded item           │
//! │  amount = min(item total, unrefunded)   amount = unrefunded, split by   │
//! │                                         item totals                     │
//! │  sale refunded once all items are       sale refunded, refund_total =   │
//! │  returned                               paid                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both windows are measured from the sale date and are configurable
//! through [`RefundPolicy`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::settlement::derive_payment_status;
use crate::types::{PaymentStatus, Sale, SaleItem, SaleStatus};

// =============================================================================
// Policy
// =============================================================================

/// Refund windows, in days after the sale date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundPolicy {
    pub item_window_days: i64,
    pub sale_window_days: i64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        RefundPolicy {
            item_window_days: 10,
            sale_window_days: 50,
        }
    }
}

/// Which refund path is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundScope {
    Item,
    WholeSale,
}

impl RefundPolicy {
    pub fn window_days(&self, scope: RefundScope) -> i64 {
        match scope {
            RefundScope::Item => self.item_window_days,
            RefundScope::WholeSale => self.sale_window_days,
        }
    }

    /// Fails once `now` is past `sale.date + window`.
    pub fn check_window(&self, sale: &Sale, now: DateTime<Utc>, scope: RefundScope) -> CoreResult<()> {
        let window_days = self.window_days(scope);
        if now > sale.date + Duration::days(window_days) {
            return Err(CoreError::RefundWindowExpired {
                sale_id: sale.id.clone(),
                window_days,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Eligibility
// =============================================================================

/// A sale can be refunded while it is confirmed and some money came in.
pub fn check_refundable(sale: &Sale) -> CoreResult<()> {
    if sale.status == SaleStatus::Refunded || sale.payment_status == PaymentStatus::Refunded {
        return Err(CoreError::AlreadyRefunded(sale.id.clone()));
    }

    let paid_something = matches!(
        sale.payment_status,
        PaymentStatus::Paid | PaymentStatus::Partial
    );
    if !paid_something || !sale.paid().is_positive() {
        return Err(CoreError::NotPaid(sale.id.clone()));
    }

    Ok(())
}

/// Picks the sale item a product refund applies to.
///
/// Only items not refunded yet are candidates. When the product appears on
/// several lines, a line whose quantity matches the request wins; otherwise
/// the first candidate is checked and the quantity mismatch is reported.
pub fn select_refund_item<'a>(
    sale: &Sale,
    items: &'a [SaleItem],
    refunded_item_ids: &[String],
    product_id: &str,
    quantity: i64,
) -> CoreResult<&'a SaleItem> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    let for_product: Vec<&SaleItem> = items.iter().filter(|i| i.product_id == product_id).collect();
    if for_product.is_empty() {
        return Err(CoreError::ProductNotInSale {
            sale_id: sale.id.clone(),
            product_id: product_id.to_string(),
        });
    }

    let candidates: Vec<&SaleItem> = for_product
        .into_iter()
        .filter(|i| !refunded_item_ids.contains(&i.id))
        .collect();

    let first = candidates
        .first()
        .copied()
        .ok_or_else(|| CoreError::ItemAlreadyRefunded {
            sale_id: sale.id.clone(),
            product_id: product_id.to_string(),
        })?;

    let item = candidates
        .iter()
        .copied()
        .find(|i| i.quantity == quantity)
        .unwrap_or(first);

    check_full_quantity(item, quantity)?;
    Ok(item)
}

/// Refunds are full-quantity only.
pub fn check_full_quantity(item: &SaleItem, requested: i64) -> CoreResult<()> {
    if requested != item.quantity {
        return Err(CoreError::PartialRefundNotAllowed {
            sold: item.quantity,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Amounts
// =============================================================================

/// Money received on the sale that has not been handed back yet.
#[inline]
pub fn unrefunded(sale: &Sale) -> Money {
    sale.paid().saturating_sub_floor(sale.refund_total())
}

/// Refund amount for a single item: its total, capped by what is left to
/// hand back.
pub fn item_refund_amount(sale: &Sale, item: &SaleItem) -> Money {
    item.total_price().min(unrefunded(sale))
}

/// Splits everything not yet handed back across `items` by their totals.
///
/// The shares sum to exactly [`unrefunded`]; the last item absorbs rounding.
pub fn allocate_sale_refund(sale: &Sale, items: &[&SaleItem]) -> Vec<Money> {
    let weights: Vec<Money> = items.iter().map(|i| i.total_price()).collect();
    unrefunded(sale).allocate(&weights)
}

// =============================================================================
// Status After Refund
// =============================================================================

/// Sale and payment status once the refund set of a sale changes.
///
/// `all_items_refunded` marks the sale refunded; otherwise the status is
/// derived from the payment ledger again, which is what a reversal needs.
pub fn status_after_refunds(
    all_items_refunded: bool,
    paid: Money,
    final_amount: Money,
) -> (SaleStatus, PaymentStatus) {
    if all_items_refunded {
        (SaleStatus::Refunded, PaymentStatus::Refunded)
    } else {
        (SaleStatus::Confirmed, derive_payment_status(paid, final_amount))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, PaymentMethod};

    fn sale(date: DateTime<Utc>, paid_cents: i64) -> Sale {
        Sale {
            id: "s1".into(),
            order_id: None,
            user_id: "cashier".into(),
            customer_id: None,
            sale_type: Channel::Retail,
            status: SaleStatus::Confirmed,
            payment_status: derive_payment_status(
                Money::from_cents(paid_cents),
                Money::from_cents(9000),
            ),
            is_loan: paid_cents < 9000,
            total_cents: 9000,
            discount_cents: 0,
            final_cents: 9000,
            paid_cents,
            refund_total_cents: 0,
            payment_method: PaymentMethod::Cash,
            date,
        }
    }

    fn item(id: &str, product: &str, qty: i64, unit_cents: i64) -> SaleItem {
        SaleItem {
            id: id.into(),
            sale_id: "s1".into(),
            product_id: product.into(),
            batch_id: Some(format!("batch-{id}")),
            quantity: qty,
            price_per_unit_cents: unit_cents,
            total_price_cents: qty * unit_cents,
        }
    }

    #[test]
    fn test_item_window_expires_after_ten_days() {
        let policy = RefundPolicy::default();
        let now = Utc::now();

        let s = sale(now - Duration::days(11), 9000);
        assert!(matches!(
            policy.check_window(&s, now, RefundScope::Item),
            Err(CoreError::RefundWindowExpired { window_days: 10, .. })
        ));
        // Same sale is still inside the whole-sale window
        assert!(policy.check_window(&s, now, RefundScope::WholeSale).is_ok());

        let s = sale(now - Duration::days(9), 9000);
        assert!(policy.check_window(&s, now, RefundScope::Item).is_ok());
    }

    #[test]
    fn test_refundable_requires_payment() {
        let s = sale(Utc::now(), 0);
        assert!(matches!(check_refundable(&s), Err(CoreError::NotPaid(_))));

        let s = sale(Utc::now(), 4000);
        assert!(check_refundable(&s).is_ok());

        let mut s = sale(Utc::now(), 9000);
        s.status = SaleStatus::Refunded;
        assert!(matches!(check_refundable(&s), Err(CoreError::AlreadyRefunded(_))));
    }

    #[test]
    fn test_partial_quantity_rejected() {
        let s = sale(Utc::now(), 9000);
        let items = vec![item("i1", "p1", 3, 3000)];

        let err = select_refund_item(&s, &items, &[], "p1", 2).unwrap_err();
        assert!(matches!(
            err,
            CoreError::PartialRefundNotAllowed { sold: 3, requested: 2 }
        ));
    }

    #[test]
    fn test_select_prefers_matching_line() {
        let s = sale(Utc::now(), 9000);
        let items = vec![item("i1", "p1", 2, 1000), item("i2", "p1", 5, 1000)];

        let picked = select_refund_item(&s, &items, &[], "p1", 5).unwrap();
        assert_eq!(picked.id, "i2");

        let picked = select_refund_item(&s, &items, &["i1".to_string()], "p1", 5).unwrap();
        assert_eq!(picked.id, "i2");

        let err = select_refund_item(&s, &items, &["i1".into(), "i2".into()], "p1", 5).unwrap_err();
        assert!(matches!(err, CoreError::ItemAlreadyRefunded { .. }));

        let err = select_refund_item(&s, &items, &[], "p9", 1).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotInSale { .. }));
    }

    #[test]
    fn test_item_amount_capped_by_unrefunded() {
        let mut s = sale(Utc::now(), 4000);
        let i = item("i1", "p1", 3, 3000);
        assert_eq!(item_refund_amount(&s, &i).cents(), 4000);

        s.refund_total_cents = 4000;
        assert_eq!(item_refund_amount(&s, &i), Money::zero());
    }

    #[test]
    fn test_sale_allocation_sums_to_unrefunded() {
        let mut s = sale(Utc::now(), 9000);
        s.paid_cents = 10000;
        let a = item("i1", "p1", 1, 3000);
        let b = item("i2", "p2", 1, 3000);
        let c = item("i3", "p3", 1, 3000);

        let shares = allocate_sale_refund(&s, &[&a, &b, &c]);
        assert_eq!(shares.iter().sum::<Money>().cents(), 10000);
        assert_eq!(shares[2].cents(), 3334);
    }

    #[test]
    fn test_status_after_refunds() {
        assert_eq!(
            status_after_refunds(true, Money::from_cents(9000), Money::from_cents(9000)),
            (SaleStatus::Refunded, PaymentStatus::Refunded)
        );
        assert_eq!(
            status_after_refunds(false, Money::from_cents(4000), Money::from_cents(9000)),
            (SaleStatus::Confirmed, PaymentStatus::Partial)
        );
    }
}
