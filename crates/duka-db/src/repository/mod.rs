//! # Repository Module
//!
//! SQL for every table, one module per aggregate.
//!
//! ## Two Access Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Access                                    │
//! │                                                                         │
//! │  Workflows (inside a transaction)       Readers (outside)               │
//! │  ────────────────────────────────       ─────────────────               │
//! │  let mut tx = db.begin_write().await?;  db.sale_records()               │
//! │  sale::fetch(&mut *tx, id)                .get_by_id(id)                │
//! │  batch::take_quantity(&mut *tx, ..)       .await?                       │
//! │  payment::insert(&mut *tx, ..)                                          │
//! │  tx.commit().await?;                    XRepository { pool }            │
//! │                                                                         │
//! │  free functions over                    struct methods over             │
//! │  &mut SqliteConnection                  a pooled connection             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Free functions never open or commit transactions; the caller owns the
//! boundary.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Categories and products
//! - [`BatchRepository`] - Product batches and their quantities
//! - [`StockEntryRepository`] - Stock movement audit trail
//! - [`CustomerRepository`] - Customers
//! - [`OrderRepository`] - Orders and order items
//! - [`SaleRepository`] - Sales and sale items
//! - [`PaymentRepository`] - Payment ledger
//! - [`RefundRepository`] - Refunds

pub mod batch;
pub mod customer;
pub mod order;
pub mod payment;
pub mod product;
pub mod refund;
pub mod sale;
pub mod stock;

pub use batch::BatchRepository;
pub use customer::CustomerRepository;
pub use order::OrderRepository;
pub use payment::PaymentRepository;
pub use product::ProductRepository;
pub use refund::RefundRepository;
pub use sale::SaleRepository;
pub use stock::StockEntryRepository;

/// `?N, ?N+1, ...` for `count` parameters starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3, 2), "?3, ?4");
        assert_eq!(placeholders(1, 1), "?1");
        assert_eq!(placeholders(1, 0), "");
    }
}
