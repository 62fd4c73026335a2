//! # Loan Payments
//!
//! Rules for paying down a sale that was not settled at the till.
//!
//! ```text
//! final 100.00, paid 40.00  (partial)
//!      │
//!      ▼  pay 60.00
//! check_loan_payment ──► paid 100.00 (paid)
//!      │
//!      ▼  pay 0.01
//! OverpaymentError { amount: 0.01, remaining: 0.00 }
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::settlement::derive_payment_status;
use crate::types::{PaymentStatus, Sale, SaleStatus};

/// Outcome of an accepted loan payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPayment {
    pub amount: Money,
    pub new_paid: Money,
    pub new_status: PaymentStatus,
}

/// Validates a payment of `amount` against `sale`.
///
/// Refunded sales take no further payments. The amount must be positive and
/// no larger than the outstanding balance.
pub fn check_loan_payment(sale: &Sale, amount: Money) -> CoreResult<LoanPayment> {
    if sale.status == SaleStatus::Refunded || sale.payment_status == PaymentStatus::Refunded {
        return Err(CoreError::AlreadyRefunded(sale.id.clone()));
    }

    if !amount.is_positive() {
        return Err(CoreError::InvalidAmount {
            reason: "amount must be greater than 0".to_string(),
        });
    }

    let remaining = sale.final_amount() - sale.paid();
    if amount > remaining {
        return Err(CoreError::OverpaymentError {
            amount: amount.to_string(),
            remaining: remaining.to_string(),
        });
    }

    let new_paid = sale.paid() + amount;
    Ok(LoanPayment {
        amount,
        new_paid,
        new_status: derive_payment_status(new_paid, sale.final_amount()),
    })
}
