//! # Error Types
//!
//! Domain-specific error types for duka-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  duka-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Malformed input                                │
//! │  └── ErrorKind        - Machine-checkable category of either           │
//! │                                                                         │
//! │  duka-db errors (separate crate)                                       │
//! │  └── DbError          - Storage failures + wrapped CoreError           │
//! │                                                                         │
//! │  ErrorReport          - What a request layer hands to its caller       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorReport             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Kinds
//! Every error maps to exactly one [`ErrorKind`]:
//! - `Validation` - input is malformed (bad quantity, batch/product mismatch)
//! - `StateConflict` - the entity is in the wrong state (already confirmed,
//!   already refunded, refund window expired)
//! - `ResourceExhausted` - not enough stock, payment exceeds the balance
//! - `NotFound` - a referenced order/sale/batch does not exist
//! - `PermissionDenied` - the actor lacks the capability
//! - `Internal` - storage failure (only produced by duka-db)

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-checkable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    StateConflict,
    ResourceExhausted,
    NotFound,
    PermissionDenied,
    /// Storage or infrastructure failure; never caused by the caller's input.
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. Workflows check every
/// rule before the first write, so returning one of these never leaves a
/// half-applied transaction behind.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Refund not found: {0}")]
    RefundNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Order is no longer pending/updated.
    ///
    /// ## When This Occurs
    /// - Confirming an order that was already confirmed
    /// - Two cashiers confirming the same order at the same time
    #[error("Order {order_id} is already processed ({status})")]
    AlreadyProcessed { order_id: String, status: String },

    /// Order state machine rejected the transition.
    #[error("Order {order_id} cannot {action} while {status}")]
    InvalidOrderTransition {
        order_id: String,
        action: String,
        status: String,
    },

    /// A line item has no batch attached.
    #[error("Item for product {product_id} has no batch")]
    BatchMissing { product_id: String },

    /// Batch belongs to a different product than the line item states.
    #[error("Batch {batch_id} does not belong to product {product_id}")]
    BatchMismatch { batch_id: String, product_id: String },

    /// Not enough quantity left in the batch.
    ///
    /// ## User Workflow
    /// ```text
    /// Confirm order (qty: 10)
    ///      │
    ///      ▼
    /// Batch B-001 quantity = 5
    ///      │
    ///      ▼
    /// InsufficientStock { batch: "B-001", available: 5, requested: 10 }
    ///      │
    ///      ▼
    /// Whole transaction rolls back, batch stays at 5
    /// ```
    #[error("Insufficient stock in batch {batch_code}: available {available}, requested {requested}")]
    InsufficientStock {
        batch_code: String,
        available: i64,
        requested: i64,
    },

    #[error("Wholesale sales require a customer (existing id or name and phone)")]
    WholesaleCustomerRequired,

    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: String, subtotal: String },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Payment is larger than what is still owed.
    #[error("Payment of {amount} exceeds remaining balance {remaining}")]
    OverpaymentError { amount: String, remaining: String },

    #[error("Refund window of {window_days} days expired for sale {sale_id}")]
    RefundWindowExpired { sale_id: String, window_days: i64 },

    #[error("Sale {0} is already refunded")]
    AlreadyRefunded(String),

    /// Every line of the product on this sale has already been returned.
    #[error("Product {product_id} on sale {sale_id} is already refunded")]
    ItemAlreadyRefunded { sale_id: String, product_id: String },

    #[error("Sale {0} has no payment to refund")]
    NotPaid(String),

    /// Refund quantity must equal the quantity sold.
    #[error("Partial refunds are not allowed: sold {sold}, requested {requested}")]
    PartialRefundNotAllowed { sold: i64, requested: i64 },

    #[error("Product {product_id} was not part of sale {sale_id}")]
    ProductNotInSale { sale_id: String, product_id: String },

    /// Batch is referenced by historical order/sale/refund rows.
    #[error("Batch {0} is referenced by existing orders or sales and cannot be deleted")]
    BatchInUse(String),

    #[error("{user_id} is not allowed to {capability}")]
    PermissionDenied { user_id: String, capability: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the machine-checkable category of this error.
    pub fn kind(&self) -> ErrorKind {
        use CoreError::*;
        match self {
            OrderNotFound(_) | SaleNotFound(_) | ProductNotFound(_) | BatchNotFound(_)
            | RefundNotFound(_) | CustomerNotFound(_) => ErrorKind::NotFound,

            AlreadyProcessed { .. }
            | InvalidOrderTransition { .. }
            | RefundWindowExpired { .. }
            | AlreadyRefunded(_)
            | ItemAlreadyRefunded { .. }
            | NotPaid(_)
            | BatchInUse(_) => ErrorKind::StateConflict,

            InsufficientStock { .. } | OverpaymentError { .. } => ErrorKind::ResourceExhausted,

            BatchMissing { .. }
            | BatchMismatch { .. }
            | WholesaleCustomerRequired
            | DiscountExceedsSubtotal { .. }
            | InvalidAmount { .. }
            | PartialRefundNotAllowed { .. }
            | ProductNotInSale { .. }
            | Validation(_) => ErrorKind::Validation,

            PermissionDenied { .. } => ErrorKind::PermissionDenied,
        }
    }

    /// Stable SCREAMING_SNAKE_CASE code for the variant.
    pub fn code(&self) -> &'static str {
        use CoreError::*;
        match self {
            OrderNotFound(_) => "ORDER_NOT_FOUND",
            SaleNotFound(_) => "SALE_NOT_FOUND",
            ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            BatchNotFound(_) => "BATCH_NOT_FOUND",
            RefundNotFound(_) => "REFUND_NOT_FOUND",
            CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            InvalidOrderTransition { .. } => "INVALID_ORDER_TRANSITION",
            BatchMissing { .. } => "BATCH_MISSING",
            BatchMismatch { .. } => "BATCH_MISMATCH",
            InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            WholesaleCustomerRequired => "WHOLESALE_CUSTOMER_REQUIRED",
            DiscountExceedsSubtotal { .. } => "DISCOUNT_EXCEEDS_SUBTOTAL",
            InvalidAmount { .. } => "INVALID_AMOUNT",
            OverpaymentError { .. } => "OVERPAYMENT",
            RefundWindowExpired { .. } => "REFUND_WINDOW_EXPIRED",
            AlreadyRefunded(_) => "ALREADY_REFUNDED",
            ItemAlreadyRefunded { .. } => "ITEM_ALREADY_REFUNDED",
            NotPaid(_) => "NOT_PAID",
            PartialRefundNotAllowed { .. } => "PARTIAL_REFUND_NOT_ALLOWED",
            ProductNotInSale { .. } => "PRODUCT_NOT_IN_SALE",
            BatchInUse(_) => "BATCH_IN_USE",
            PermissionDenied { .. } => "PERMISSION_DENIED",
            Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, unparseable amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., batch code already used for the product).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// An order or sale was submitted without line items.
    #[error("At least one item is required")]
    EmptyItems,
}

// =============================================================================
// Error Report
// =============================================================================

/// Structured, transport-neutral error for callers.
///
/// ```json
/// {
///   "kind": "resource_exhausted",
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock in batch B-001: available 5, requested 10"
/// }
/// ```
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl From<&CoreError> for ErrorReport {
    fn from(err: &CoreError) -> Self {
        ErrorReport {
            kind: err.kind(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            batch_code: "B-001".to_string(),
            available: 5,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock in batch B-001: available 5, requested 10"
        );

        let err = CoreError::PartialRefundNotAllowed {
            sold: 3,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Partial refunds are not allowed: sold 3, requested 2"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::OrderNotFound("o1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::AlreadyRefunded("s1".into()).kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            CoreError::OverpaymentError {
                amount: "1.00".into(),
                remaining: "0.00".into()
            }
            .kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            CoreError::BatchMismatch {
                batch_id: "b".into(),
                product_id: "p".into()
            }
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "batch_code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_report_serializes_kind_and_code() {
        let err = CoreError::NotPaid("s-9".into());
        let report = ErrorReport::from(&err);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["kind"], "state_conflict");
        assert_eq!(json["code"], "NOT_PAID");
        assert_eq!(json["message"], "Sale s-9 has no payment to refund");
    }
}
