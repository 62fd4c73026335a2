//! # duka-core: Pure Business Logic for Duka
//!
//! Every business rule of the shop backend lives here as plain functions
//! over plain data. Nothing in this crate touches a database, the network
//! or the clock; callers pass `now`/`today` in.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Duka Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request layer (HTTP, sessions, reports)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 duka-db workflows (transactions)                │   │
//! │  │   confirm_order, create_direct_sale, pay_loan, refund_item ...  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ asks                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ duka-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   pricing     order        settlement    loan       refund      │   │
//! │  │   resolve     transition   totals        balance    windows     │   │
//! │  │   price       rules        status        checks     allocation  │   │
//! │  │                                                                 │   │
//! │  │   inventory   auth         validation    money      types       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and status enums
//! - [`money`] - Integer money with half-up parsing and allocation
//! - [`pricing`] - Channel-aware batch price resolution
//! - [`order`] - Order state machine
//! - [`settlement`] - Sale totals, tender, payment status
//! - [`loan`] - Loan repayment rules
//! - [`refund`] - Refund eligibility and amounts
//! - [`inventory`] - Stock checks and derived product stock
//! - [`auth`] - Actors and capabilities
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use duka_core::money::Money;
//! use duka_core::settlement::{derive_payment_status, SaleTotals};
//! use duka_core::PaymentStatus;
//!
//! let totals = SaleTotals::compute(&[], Money::zero()).unwrap();
//! assert_eq!(totals.final_amount, Money::zero());
//!
//! let status = derive_payment_status(Money::from_cents(4000), Money::from_cents(10000));
//! assert_eq!(status, PaymentStatus::Partial);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod error;
pub mod inventory;
pub mod loan;
pub mod money;
pub mod order;
pub mod pricing;
pub mod refund;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use auth::{Actor, Authorizer, Capability, Role, RolePolicy};
pub use error::{CoreError, CoreResult, ErrorKind, ErrorReport, ValidationError};
pub use inventory::{ProductStock, StockPolicy};
pub use money::Money;
pub use refund::RefundPolicy;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items on a single order or sale.
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum quantity on a single line.
///
/// Wholesale lines run to cartons of thousands, so this only catches typos.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;

/// Maximum unit price in minor units (100,000,000.00).
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_LINE_ITEMS`] this keeps every sale
/// total well inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;
