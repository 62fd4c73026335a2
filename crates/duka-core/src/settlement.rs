//! # Sale Settlement
//!
//! Totals, discount rules, tender handling and payment status derivation.
//! Both sale paths (order confirmation and direct sale) run their numbers
//! through here so they cannot drift apart.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  priced lines ──► SaleTotals::compute ──► total, discount, final       │
//! │                                              │                          │
//! │  amount tendered ──► settle_tender ──────────┤                          │
//! │                        │                     ▼                          │
//! │                        └─► change_due   recorded payment               │
//! │                                              │                          │
//! │  payment ledger ──► project_ledger ──► paid / refund_total             │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                         derive_payment_status(paid, final)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentStatus;

// =============================================================================
// Sale Totals
// =============================================================================

/// A line ready to be written as a sale item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Money figures of a sale at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub total: Money,
    pub discount: Money,
    /// `max(total - discount, 0)`.
    pub final_amount: Money,
}

impl SaleTotals {
    /// Sums the lines and applies the discount.
    ///
    /// A negative discount is an error, and so is a total that does not fit
    /// in `i64`. A discount larger than the total is clamped here; callers
    /// that must refuse it use [`SaleTotals::ensure_discount_within_total`].
    pub fn compute(lines: &[PricedLine], discount: Money) -> CoreResult<SaleTotals> {
        if discount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "discount".to_string(),
            }
            .into());
        }

        let total = lines
            .iter()
            .try_fold(Money::zero(), |sum, line| {
                line.unit_price
                    .checked_multiply_quantity(line.quantity)
                    .and_then(|line_total| sum.checked_add(line_total))
            })
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "total".to_string(),
                min: 0,
                max: i64::MAX,
            })?;

        Ok(SaleTotals {
            total,
            discount,
            final_amount: total.saturating_sub_floor(discount),
        })
    }

    /// Refuses a discount that exceeds the total.
    pub fn ensure_discount_within_total(&self) -> CoreResult<()> {
        if self.discount > self.total {
            return Err(CoreError::DiscountExceedsSubtotal {
                discount: self.discount.to_string(),
                subtotal: self.total.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Tender
// =============================================================================

/// What is recorded from an amount handed over at the till.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tender {
    /// Goes into the payment ledger; never more than the final amount.
    pub recorded: Money,
    pub change_due: Money,
}

/// Splits a tendered amount into the recorded payment and the change.
pub fn settle_tender(final_amount: Money, tendered: Money) -> CoreResult<Tender> {
    if tendered.is_negative() {
        return Err(CoreError::InvalidAmount {
            reason: "amount paid must not be negative".to_string(),
        });
    }

    let recorded = tendered.min(final_amount);
    Ok(Tender {
        recorded,
        change_due: tendered - recorded,
    })
}

// =============================================================================
// Ledger Projection
// =============================================================================

/// Cached projections of the payment ledger stored on the sale row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerTotals {
    /// Σ of positive payment rows.
    pub paid: Money,
    /// Σ of |negative payment rows|.
    pub refund_total: Money,
}

/// Recomputes `paid` and `refund_total` from raw ledger amounts.
pub fn project_ledger<I>(amounts: I) -> LedgerTotals
where
    I: IntoIterator<Item = Money>,
{
    amounts
        .into_iter()
        .fold(LedgerTotals::default(), |mut totals, amount| {
            if amount.is_negative() {
                totals.refund_total += amount.abs();
            } else {
                totals.paid += amount;
            }
            totals
        })
}

// =============================================================================
// Payment Status
// =============================================================================

/// Derives the payment status of a sale that has not been refunded.
///
/// | condition                | status     |
/// |--------------------------|------------|
/// | `paid >= final`          | `Paid`     |
/// | `paid == 0`              | `NotPaid`  |
/// | otherwise                | `Partial`  |
pub fn derive_payment_status(paid: Money, final_amount: Money) -> PaymentStatus {
    if paid >= final_amount {
        PaymentStatus::Paid
    } else if paid.is_zero() {
        PaymentStatus::NotPaid
    } else {
        PaymentStatus::Partial
    }
}

/// A sale is a loan while it is not fully paid.
#[inline]
pub fn is_loan(status: PaymentStatus) -> bool {
    status != PaymentStatus::Paid
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, unit_cents: i64) -> PricedLine {
        PricedLine {
            product_id: "p1".into(),
            batch_id: "b1".into(),
            quantity: qty,
            unit_price: Money::from_cents(unit_cents),
        }
    }

    #[test]
    fn test_totals() {
        let totals =
            SaleTotals::compute(&[line(3, 299), line(1, 1000)], Money::from_cents(97)).unwrap();
        assert_eq!(totals.total.cents(), 1897);
        assert_eq!(totals.final_amount.cents(), 1800);
        assert!(totals.ensure_discount_within_total().is_ok());
    }

    #[test]
    fn test_final_amount_floors_at_zero() {
        let totals = SaleTotals::compute(&[line(1, 500)], Money::from_cents(800)).unwrap();
        assert_eq!(totals.final_amount, Money::zero());
        assert!(matches!(
            totals.ensure_discount_within_total(),
            Err(CoreError::DiscountExceedsSubtotal { .. })
        ));
    }

    #[test]
    fn test_total_overflow_is_a_validation_error() {
        let err = SaleTotals::compute(&[line(100_000, i64::MAX / 1000)], Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));

        let err = SaleTotals::compute(&[line(1, i64::MAX), line(1, 1)], Money::zero()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_negative_discount_rejected() {
        let err = SaleTotals::compute(&[line(1, 500)], Money::from_cents(-1)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_tender_clamps_and_returns_change() {
        let tender = settle_tender(Money::from_cents(10000), Money::from_cents(12000)).unwrap();
        assert_eq!(tender.recorded.cents(), 10000);
        assert_eq!(tender.change_due.cents(), 2000);

        let tender = settle_tender(Money::from_cents(10000), Money::from_cents(4000)).unwrap();
        assert_eq!(tender.recorded.cents(), 4000);
        assert_eq!(tender.change_due, Money::zero());

        assert!(settle_tender(Money::from_cents(100), Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_payment_status_derivation() {
        let hundred = Money::from_cents(10000);
        assert_eq!(derive_payment_status(Money::zero(), hundred), PaymentStatus::NotPaid);
        assert_eq!(
            derive_payment_status(Money::from_cents(4000), hundred),
            PaymentStatus::Partial
        );
        assert_eq!(derive_payment_status(hundred, hundred), PaymentStatus::Paid);
        // Fully discounted sale is paid with nothing tendered
        assert_eq!(derive_payment_status(Money::zero(), Money::zero()), PaymentStatus::Paid);

        assert!(is_loan(PaymentStatus::Partial));
        assert!(!is_loan(PaymentStatus::Paid));
    }

    #[test]
    fn test_project_ledger() {
        let totals = project_ledger([
            Money::from_cents(4000),
            Money::from_cents(6000),
            Money::from_cents(-2500),
        ]);
        assert_eq!(totals.paid.cents(), 10000);
        assert_eq!(totals.refund_total.cents(), 2500);
    }
}
