//! # duka-db: Database Layer and Workflows for Duka
//!
//! This crate owns every byte written to the shop database. It uses SQLite
//! through sqlx, and every boundary operation (confirm an order, sell, take
//! a loan payment, refund) runs as one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Duka Data Flow                                 │
//! │                                                                         │
//! │  Request layer (confirm order #42, pay 60.00 ...)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     duka-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   │   │
//! │  │   │  Workflows   │──►│    Ledger    │──►│   Repositories   │   │   │
//! │  │   │ order, sale  │   │ batch stock  │   │ one module per   │   │   │
//! │  │   │ loan, refund │   │ + entries    │   │ table family     │   │   │
//! │  │   │ inventory    │   └──────────────┘   └────────┬─────────┘   │   │
//! │  │   └──────┬───────┘                               │             │   │
//! │  │          │ asks                                  │             │   │
//! │  │          ▼                                       │             │   │
//! │  │   duka-core rules                                │             │   │
//! │  │                                                  │             │   │
//! │  │   ┌──────────────┐   ┌──────────────┐            │             │   │
//! │  │   │   Database   │   │  Migrations  │            │             │   │
//! │  │   │  (pool.rs)   │   │  (embedded)  │◄───────────┘             │   │
//! │  │   └──────────────┘   └──────────────┘                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  SQLite Database (duka.db, WAL)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, authorizer, workflow accessors
//! - [`config`] - `duka.toml` store configuration with env overrides
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`ledger`] - The only code that changes batch quantities
//! - [`repository`] - Row access per table family
//! - [`workflow`] - Transactional boundary operations
//! - [`logging`] - Tracing subscriber setup for binaries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_core::{Actor, Money, PaymentMethod, Role};
//! use duka_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("duka.db")).await?;
//! let cashier = Actor::new("cashier-1", Role::Cashier);
//!
//! let sale = db
//!     .orders()
//!     .confirm_order(&cashier, &order_id, PaymentMethod::Cash, Money::from_major(100))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod workflow;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, StoreConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    BatchRepository, CustomerRepository, OrderRepository, PaymentRepository, ProductRepository,
    RefundRepository, SaleRepository, StockEntryRepository,
};

// Workflow re-exports for convenience
pub use workflow::{
    BatchPriceUpdate, InventoryWorkflow, LoanWorkflow, NewBatch, NewDirectSale, NewOrder,
    NewProduct, OrderWorkflow, RefundWorkflow, SaleWorkflow,
};
