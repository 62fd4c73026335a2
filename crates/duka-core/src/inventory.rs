//! # Batch Inventory Rules
//!
//! Pure checks behind the inventory ledger, plus the derived stock view of
//! a product.
//!
//! ## Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  batch.quantity >= 0, always                                            │
//! │                                                                         │
//! │  1. check_decrement() here        → friendly InsufficientStock error    │
//! │  2. conditional UPDATE in duka-db → no oversell under concurrency       │
//! │  3. CHECK (quantity >= 0) column  → last line in the schema             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products never carry a quantity of their own. [`ProductStock`] is always
//! computed by summing batches.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, ProductBatch, StockEntryType};

// =============================================================================
// Ledger Checks
// =============================================================================

fn ensure_positive(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Checks that `quantity` can be taken out of `batch`.
pub fn check_decrement(batch: &ProductBatch, quantity: i64) -> CoreResult<()> {
    ensure_positive(quantity)?;
    if batch.quantity < quantity {
        return Err(CoreError::InsufficientStock {
            batch_code: batch.batch_code.clone(),
            available: batch.quantity,
            requested: quantity,
        });
    }
    Ok(())
}

/// Checks that `quantity` can be put into a batch.
pub fn check_increment(quantity: i64) -> CoreResult<()> {
    ensure_positive(quantity)
}

/// Turns a manual stock correction into a ledger movement.
///
/// Returns `None` when the quantity does not change.
pub fn adjustment(batch: &ProductBatch, new_quantity: i64) -> CoreResult<Option<(StockEntryType, i64)>> {
    if new_quantity < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        }
        .into());
    }

    let delta = new_quantity - batch.quantity;
    Ok(match delta {
        0 => None,
        d if d > 0 => Some((StockEntryType::Added, d)),
        d => Some((StockEntryType::Removed, -d)),
    })
}

// =============================================================================
// Stock Policy
// =============================================================================

/// How far ahead a batch counts as expiring soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockPolicy {
    pub soon_expiry_days: i64,
}

impl Default for StockPolicy {
    fn default() -> Self {
        StockPolicy {
            soon_expiry_days: 180,
        }
    }
}

// =============================================================================
// Product Stock
// =============================================================================

/// Short batch reference used in stock reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchSummary {
    pub batch_id: String,
    pub batch_code: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub quantity: i64,
}

impl From<&ProductBatch> for BatchSummary {
    fn from(batch: &ProductBatch) -> Self {
        BatchSummary {
            batch_id: batch.id.clone(),
            batch_code: batch.batch_code.clone(),
            expiry_date: batch.expiry_date,
            quantity: batch.quantity,
        }
    }
}

/// Stock position of one product, derived from its batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductStock {
    pub product_id: String,
    pub total_quantity: i64,
    /// `total_quantity <= low_stock_threshold`.
    pub low_stock: bool,
    /// Batches past their expiry date.
    pub expired_batches: Vec<BatchSummary>,
    /// Batches expiring from today up to the policy horizon.
    pub soon_expiring_batches: Vec<BatchSummary>,
    /// Buying cost of the quantity sitting in expired batches.
    pub expired_loss_cents: i64,
}

impl ProductStock {
    /// Derives the stock view of `product` from `batches` as of `today`.
    ///
    /// Batches belonging to other products are ignored.
    pub fn compute(
        product: &Product,
        batches: &[ProductBatch],
        today: NaiveDate,
        policy: &StockPolicy,
    ) -> ProductStock {
        let horizon = today + Duration::days(policy.soon_expiry_days);
        let own = batches.iter().filter(|b| b.product_id == product.id);

        let mut total_quantity = 0;
        let mut expired_batches = Vec::new();
        let mut soon_expiring_batches = Vec::new();
        let mut expired_loss = Money::zero();

        for batch in own {
            total_quantity = batch.quantity.saturating_add(total_quantity);
            if batch.is_expired(today) {
                let loss = batch.buying_price().cents().saturating_mul(batch.quantity);
                expired_loss = Money::from_cents(expired_loss.cents().saturating_add(loss));
                expired_batches.push(BatchSummary::from(batch));
            } else if batch.expiry_date < horizon {
                soon_expiring_batches.push(BatchSummary::from(batch));
            }
        }

        ProductStock {
            product_id: product.id.clone(),
            total_quantity,
            low_stock: total_quantity <= product.low_stock_threshold,
            expired_batches,
            soon_expiring_batches,
            expired_loss_cents: expired_loss.cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn batch(code: &str, qty: i64, expires_in_days: i64) -> ProductBatch {
        ProductBatch {
            id: format!("id-{code}"),
            product_id: "p1".into(),
            batch_code: code.into(),
            expiry_date: today() + Duration::days(expires_in_days),
            buying_price_cents: 250,
            selling_price_cents: 400,
            wholesale_price_cents: 350,
            quantity: qty,
            recorded_by: "admin".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_decrement() {
        let b = batch("B-001", 5, 365);
        assert!(check_decrement(&b, 5).is_ok());

        let err = check_decrement(&b, 10).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 5, requested: 10, .. }
        ));
        assert!(matches!(check_decrement(&b, 0), Err(CoreError::Validation(_))));
        assert!(check_increment(-3).is_err());
    }

    #[test]
    fn test_adjustment_direction() {
        let b = batch("B-001", 5, 365);
        assert_eq!(adjustment(&b, 8).unwrap(), Some((StockEntryType::Added, 3)));
        assert_eq!(adjustment(&b, 2).unwrap(), Some((StockEntryType::Removed, 3)));
        assert_eq!(adjustment(&b, 5).unwrap(), None);
        assert!(adjustment(&b, -1).is_err());
    }

    #[test]
    fn test_product_stock() {
        let product = Product {
            id: "p1".into(),
            name: "Panadol".into(),
            category_id: None,
            low_stock_threshold: 20,
            created_at: Utc::now(),
        };
        let batches = vec![
            batch("OLD", 4, -1),
            batch("SOON", 6, 30),
            batch("FRESH", 8, 400),
            ProductBatch {
                product_id: "p2".into(),
                ..batch("OTHER", 100, 400)
            },
        ];

        let stock = ProductStock::compute(&product, &batches, today(), &StockPolicy::default());
        assert_eq!(stock.total_quantity, 18);
        assert!(stock.low_stock);
        assert_eq!(stock.expired_batches.len(), 1);
        assert_eq!(stock.expired_batches[0].batch_code, "OLD");
        assert_eq!(stock.soon_expiring_batches.len(), 1);
        assert_eq!(stock.soon_expiring_batches[0].batch_code, "SOON");
        assert_eq!(stock.expired_loss_cents, 1000);
    }
}
