//! # Workflows
//!
//! The boundary operations of the shop. Each public method is one SQLite
//! transaction: every stock movement, ledger row and status change commits
//! together or not at all.
//!
//! ## Shape of Every Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. authorizer.require(actor, capability)      ← before any I/O        │
//! │  2. validate request fields                    ← pure, duka-core       │
//! │  3. let mut tx = db.begin_write().await?;      ← BEGIN IMMEDIATE       │
//! │  4. read rows, run duka-core rules             ← errors before writes  │
//! │  5. writes: ledger, rows, projections                                  │
//! │  6. tx.commit().await?;                                                │
//! │                                                                         │
//! │  Any `?` between 3 and 6 drops `tx` → ROLLBACK.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`OrderWorkflow`] - create, update, reject, resend, delete, confirm
//! - [`SaleWorkflow`] - walk-in sales
//! - [`LoanWorkflow`] - loan repayments
//! - [`RefundWorkflow`] - item refunds, whole-sale refunds, reversal
//! - [`InventoryWorkflow`] - catalogue, batches, stock ledger

pub mod inventory;
pub mod loan;
pub mod order;
pub mod refund;
pub mod sale;

pub use inventory::{BatchPriceUpdate, InventoryWorkflow, NewBatch, NewProduct};
pub use loan::LoanWorkflow;
pub use order::{NewOrder, OrderWorkflow};
pub use refund::RefundWorkflow;
pub use sale::{NewDirectSale, SaleWorkflow};

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::sale as sale_repo;
use crate::repository::{customer, payment};
use duka_core::refund::status_after_refunds;
use duka_core::settlement::{is_loan, project_ledger};
use duka_core::validation::{validate_customer_name, validate_phone};
use duka_core::{Actor, Capability, Channel, CoreError, Customer, CustomerRef, Sale};

/// Checks a capability, logging refusals.
pub(crate) fn authorize(db: &Database, actor: &Actor, capability: Capability) -> DbResult<()> {
    db.authorizer().require(actor, capability).map_err(|err| {
        warn!(
            user_id = %actor.user_id,
            capability = capability.as_str(),
            "Permission denied"
        );
        err.into()
    })
}

// =============================================================================
// Customers
// =============================================================================

/// Whether a retail request keeps the customer it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetailCustomer {
    Keep,
    Drop,
}

/// Checks the customer rule without touching the database.
pub(crate) fn check_customer(channel: Channel, customer: Option<&CustomerRef>) -> DbResult<()> {
    match customer {
        None if channel == Channel::Wholesale => Err(CoreError::WholesaleCustomerRequired.into()),
        Some(CustomerRef::New { name, phone }) => {
            if name.trim().is_empty() || phone.trim().is_empty() {
                if channel == Channel::Wholesale {
                    return Err(CoreError::WholesaleCustomerRequired.into());
                }
                return Ok(());
            }
            validate_customer_name(name)?;
            validate_phone(phone)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Turns a customer reference into a customer id, creating the customer
/// by phone when needed.
pub(crate) async fn resolve_customer(
    conn: &mut SqliteConnection,
    channel: Channel,
    customer: Option<&CustomerRef>,
    retail: RetailCustomer,
) -> DbResult<Option<String>> {
    if channel == Channel::Retail && retail == RetailCustomer::Drop {
        return Ok(None);
    }

    match customer {
        None => Ok(None),
        Some(CustomerRef::Existing { id }) => {
            let found = customer::fetch(conn, id)
                .await?
                .ok_or_else(|| CoreError::CustomerNotFound(id.clone()))?;
            Ok(Some(found.id))
        }
        Some(CustomerRef::New { name, phone }) => {
            let phone = phone.trim();
            if name.trim().is_empty() || phone.is_empty() {
                return Ok(None);
            }

            if let Some(existing) = customer::find_by_phone(conn, phone).await? {
                return Ok(Some(existing.id));
            }

            let created = Customer {
                id: Uuid::new_v4().to_string(),
                name: name.trim().to_string(),
                phone: phone.to_string(),
                created_at: Utc::now(),
            };
            customer::insert(conn, &created).await?;
            Ok(Some(created.id))
        }
    }
}

// =============================================================================
// Ledger Projection
// =============================================================================

/// Recomputes `paid`/`refund_total` from the payment ledger and rewrites
/// the sale's statuses.
///
/// `all_items_refunded` marks the sale refunded. A refunded sale keeps its
/// `is_loan` flag as history.
pub(crate) async fn reproject_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
    all_items_refunded: bool,
) -> DbResult<Sale> {
    let mut current = sale_repo::fetch(conn, sale_id)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

    let totals = project_ledger(payment::amounts(conn, sale_id).await?);
    let (status, payment_status) =
        status_after_refunds(all_items_refunded, totals.paid, current.final_amount());
    let loan = if all_items_refunded {
        current.is_loan
    } else {
        is_loan(payment_status)
    };

    sale_repo::update_projection(
        conn,
        sale_id,
        totals.paid.cents(),
        totals.refund_total.cents(),
        status,
        payment_status,
        loan,
    )
    .await?;

    current.paid_cents = totals.paid.cents();
    current.refund_total_cents = totals.refund_total.cents();
    current.status = status;
    current.payment_status = payment_status;
    current.is_loan = loan;
    Ok(current)
}
