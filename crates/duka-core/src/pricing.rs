//! # Pricing Resolver
//!
//! The single place where a channel picks a batch price tier.
//!
//! ```text
//! ┌──────────────────────┐        ┌───────────────────────────────┐
//! │ ProductBatch         │        │ resolve_price(batch, channel) │
//! │  selling_price  ─────┼─retail─►                               │
//! │  wholesale_price ────┼─whole──►  → unit price (snapshotted)   │
//! └──────────────────────┘  sale  └───────────────────────────────┘
//! ```
//!
//! Order creation, order updates, order confirmation and direct sales all
//! call [`resolve_price`]; none of them read a price column directly.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Channel, ProductBatch};

/// Resolves the unit price of `batch` for `channel`.
#[inline]
pub fn resolve_price(batch: &ProductBatch, channel: Channel) -> Money {
    match channel {
        Channel::Wholesale => batch.wholesale_price(),
        Channel::Retail => batch.selling_price(),
    }
}

/// Checks that `batch` belongs to `product_id` and resolves its price.
///
/// Used by every path that turns a (product, batch, quantity) line into a
/// priced item.
pub fn price_line(batch: &ProductBatch, product_id: &str, channel: Channel) -> CoreResult<Money> {
    if batch.product_id != product_id {
        return Err(CoreError::BatchMismatch {
            batch_id: batch.id.clone(),
            product_id: product_id.to_string(),
        });
    }
    Ok(resolve_price(batch, channel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn batch() -> ProductBatch {
        ProductBatch {
            id: "b1".into(),
            product_id: "p1".into(),
            batch_code: "B-001".into(),
            expiry_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            buying_price_cents: 700,
            selling_price_cents: 1200,
            wholesale_price_cents: 1000,
            quantity: 10,
            recorded_by: "admin".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_channel_picks_tier() {
        let b = batch();
        assert_eq!(resolve_price(&b, Channel::Retail).cents(), 1200);
        assert_eq!(resolve_price(&b, Channel::Wholesale).cents(), 1000);
    }

    #[test]
    fn test_price_line_rejects_foreign_batch() {
        let b = batch();
        assert_eq!(price_line(&b, "p1", Channel::Retail).unwrap().cents(), 1200);

        let err = price_line(&b, "p2", Channel::Retail).unwrap_err();
        assert!(matches!(err, CoreError::BatchMismatch { .. }));
    }
}
