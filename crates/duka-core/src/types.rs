//! # Domain Types
//!
//! Core domain types used throughout Duka.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │──►│  ProductBatch   │──►│   StockEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name           │   │  batch_code     │   │  entry_type     │       │
//! │  │  threshold      │   │  expiry_date    │   │  quantity       │       │
//! │  │  (no stock!)    │   │  3 prices       │   │  recorded_by    │       │
//! │  └─────────────────┘   │  quantity ≥ 0   │   └─────────────────┘       │
//! │                        └────────┬────────┘                              │
//! │                                 │ priced + decremented by               │
//! │  ┌─────────────────┐   ┌────────┴────────┐   ┌─────────────────┐       │
//! │  │     Order       │──►│      Sale       │──►│    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  OrderStatus    │   │  SaleStatus     │   │  amount (±)     │       │
//! │  │  OrderItem[]    │   │  PaymentStatus  │   │  refund_id?     │       │
//! │  └─────────────────┘   │  SaleItem[]     │   └─────────────────┘       │
//! │                        └────────┬────────┘                              │
//! │                                 ▼                                       │
//! │                        ┌─────────────────┐                              │
//! │                        │     Refund      │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `OrderItem.unit_price_cents` and `SaleItem.price_per_unit_cents` are frozen
//! when the row is written. Editing a batch's prices later never changes them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Channel
// =============================================================================

/// Sales channel. Decides which batch price tier applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Retail,
    Wholesale,
}

impl Channel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Channel::Retail => "retail",
            Channel::Wholesale => "wholesale",
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::Retail
    }
}

// =============================================================================
// Status Enums
// =============================================================================

/// Where an order sits in its workflow.
///
/// ```text
/// pending ──┬──► confirmed (terminal, produces a Sale)
///           └──► rejected ──┬──► updated ──┬──► confirmed
///                           │              └──► rejected
///                           └──► (deleted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Updated,
    Confirmed,
    Rejected,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Updated => "updated",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Rejected => "rejected",
        }
    }
}

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is finalized; stock has left the batches.
    Confirmed,
    /// Every item has been returned and the money reversed.
    Refunded,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Confirmed => "confirmed",
            SaleStatus::Refunded => "refunded",
        }
    }
}

/// How much of a sale has been paid.
///
/// Always derived from the payment ledger, see
/// [`crate::settlement::derive_payment_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotPaid,
    Partial,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "not_paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Kind of movement recorded in the stock audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockEntryType {
    /// Restock or upward correction.
    Added,
    /// Sale, downward correction or refund reversal.
    Removed,
    /// Stock came back through a refund.
    Returned,
    /// Remaining quantity written off when a batch was deleted.
    Deleted,
}

impl StockEntryType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockEntryType::Added => "added",
            StockEntryType::Removed => "removed",
            StockEntryType::Returned => "returned",
            StockEntryType::Deleted => "deleted",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    Card,
    BankTransfer,
    /// Used only on negative ledger rows written by refunds.
    Refund,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Channel, OrderStatus, SaleStatus, PaymentStatus, StockEntryType);

// =============================================================================
// Catalogue
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A product. Carries no stock of its own; stock lives in batches.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category_id: Option<String>,
    /// Total quantity at or below which the product counts as low stock.
    pub low_stock_threshold: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A dated lot of a product with its own prices and quantity.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    /// Owning product (immutable after creation).
    pub product_id: String,
    /// Unique per product.
    pub batch_code: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub buying_price_cents: i64,
    pub selling_price_cents: i64,
    pub wholesale_price_cents: i64,
    /// Never negative. Mutated only through the inventory ledger.
    pub quantity: i64,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ProductBatch {
    #[inline]
    pub fn buying_price(&self) -> Money {
        Money::from_cents(self.buying_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    #[inline]
    pub fn wholesale_price(&self) -> Money {
        Money::from_cents(self.wholesale_price_cents)
    }

    /// A batch is sellable through its expiry date and expired the day after.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

/// One row of the append-only stock movement trail.
///
/// `batch_id` is cleared when the batch is deleted; `batch_code` keeps the
/// trail readable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockEntry {
    pub id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    pub batch_code: String,
    pub entry_type: StockEntryType,
    pub quantity: i64,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Creator.
    pub user_id: String,
    pub customer_id: Option<String>,
    pub order_type: Channel,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub discount_cents: i64,
    pub rejection_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub batch_id: String,
    pub quantity: i64,
    /// Price resolved when the item was written (frozen).
    pub unit_price_cents: i64,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

// =============================================================================
// Sales
// =============================================================================

/// A finalized sale. Amount fields other than `paid_cents`,
/// `refund_total_cents` and the statuses never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Source order; `None` for walk-in sales.
    pub order_id: Option<String>,
    /// Cashier.
    pub user_id: String,
    pub customer_id: Option<String>,
    pub sale_type: Channel,
    pub status: SaleStatus,
    pub payment_status: PaymentStatus,
    pub is_loan: bool,
    pub total_cents: i64,
    pub discount_cents: i64,
    /// `max(total - discount, 0)`.
    pub final_cents: i64,
    /// Projection of Σ positive payments.
    pub paid_cents: i64,
    /// Projection of Σ |negative payments|.
    pub refund_total_cents: i64,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn refund_total(&self) -> Money {
        Money::from_cents(self.refund_total_cents)
    }

    /// What the customer still owes.
    pub fn balance(&self) -> Money {
        self.final_amount().saturating_sub_floor(self.paid())
    }
}

/// A line item in a sale. Price fields are frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// `None` only for legacy rows that predate batch tracking.
    pub batch_id: Option<String>,
    pub quantity: i64,
    pub price_per_unit_cents: i64,
    /// `quantity × price_per_unit`.
    pub total_price_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn price_per_unit(&self) -> Money {
        Money::from_cents(self.price_per_unit_cents)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

/// A row of the payment ledger.
///
/// Positive rows are money received. Negative rows are refund reversals
/// and always carry the `refund_id` that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub refund_id: Option<String>,
    pub amount_cents: i64,
    pub cashier_id: String,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A full-quantity return of one sale item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Refund {
    pub id: String,
    pub sale_id: String,
    pub sale_item_id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    pub quantity: i64,
    pub refund_amount_cents: i64,
    pub reason: Option<String>,
    pub refunded_by: String,
    #[ts(as = "String")]
    pub refund_date: DateTime<Utc>,
}

impl Refund {
    #[inline]
    pub fn refund_amount(&self) -> Money {
        Money::from_cents(self.refund_amount_cents)
    }
}

/// Result of finalizing a sale: the sale, its items and any change owed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinalizedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    /// Amount tendered above `final_cents`, handed back to the customer.
    pub change_due_cents: i64,
}

/// An order together with its items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Requests
// =============================================================================

/// How a request names its customer.
///
/// `New` is get-or-create by phone, so repeating a known phone number
/// reuses that customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerRef {
    Existing { id: String },
    New { name: String, phone: String },
}

/// One requested line of an order or direct sale. Prices are never taken
/// from the caller; they are resolved from the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub batch_id: Option<String>,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, batch_id: impl Into<String>, quantity: i64) -> Self {
        LineItem {
            product_id: product_id.into(),
            batch_id: Some(batch_id.into()),
            quantity,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_ref_wire_format() {
        let json = serde_json::json!({ "kind": "new", "name": "Amina", "phone": "+255 712 000 111" });
        let parsed: CustomerRef = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed,
            CustomerRef::New {
                name: "Amina".into(),
                phone: "+255 712 000 111".into()
            }
        );
    }

    fn batch(expiry: NaiveDate) -> ProductBatch {
        ProductBatch {
            id: "b1".into(),
            product_id: "p1".into(),
            batch_code: "B-001".into(),
            expiry_date: expiry,
            buying_price_cents: 500,
            selling_price_cents: 1000,
            wholesale_price_cents: 800,
            quantity: 10,
            recorded_by: "u1".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_strings_match_serde() {
        assert_eq!(
            serde_json::to_value(PaymentStatus::NotPaid).unwrap(),
            PaymentStatus::NotPaid.as_str()
        );
        assert_eq!(
            serde_json::to_value(PaymentMethod::MobileMoney).unwrap(),
            "mobile_money"
        );
        assert_eq!(Channel::Wholesale.to_string(), "wholesale");
        assert_eq!(OrderStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn test_batch_expiry_boundary() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(!batch(today).is_expired(today));
        assert!(batch(today.pred_opt().unwrap()).is_expired(today));
    }

    #[test]
    fn test_sale_balance_never_negative() {
        let sale = Sale {
            id: "s1".into(),
            order_id: None,
            user_id: "u1".into(),
            customer_id: None,
            sale_type: Channel::Retail,
            status: SaleStatus::Confirmed,
            payment_status: PaymentStatus::Partial,
            is_loan: true,
            total_cents: 10000,
            discount_cents: 0,
            final_cents: 10000,
            paid_cents: 4000,
            refund_total_cents: 0,
            payment_method: PaymentMethod::Cash,
            date: Utc::now(),
        };
        assert_eq!(sale.balance(), Money::from_cents(6000));
    }
}
