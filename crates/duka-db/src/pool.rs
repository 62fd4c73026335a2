//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite, plus the
//! [`Database`] handle every repository and workflow hangs off.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Service startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.orders().confirm_order(..)   ──► one transaction on one connection │
//! │  db.sales().get(..)              ──► plain read                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode so readers never block the single writer.
//! Writers queue on SQLite's lock; `busy_timeout` decides how long a
//! transaction waits for it before failing. Workflows open their
//! transactions with [`Database::begin_write`] (`BEGIN IMMEDIATE`) so the
//! lock is taken before the first read: a second writer waits at `BEGIN`,
//! then reads the committed rows and fails with the domain error.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use duka_core::{Authorizer, RolePolicy};

use crate::config::StoreConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    BatchRepository, CustomerRepository, OrderRepository, PaymentRepository, ProductRepository,
    RefundRepository, SaleRepository, StockEntryRepository,
};
use crate::workflow::{
    InventoryWorkflow, LoanWorkflow, OrderWorkflow, RefundWorkflow, SaleWorkflow,
};

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/duka/duka.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a free pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections
    /// open forever, which an in-memory database needs.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// How long a writer waits on SQLite's lock before giving up.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1, // Each connection would get its own database
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }
}

impl From<&StoreConfig> for DbConfig {
    fn from(store: &StoreConfig) -> Self {
        DbConfig::new(store.database_path.clone())
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository and workflow access.
///
/// Cloning is cheap: the pool and the authorizer are shared.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./duka.db"))
///     .await?
///     .with_store_config(StoreConfig::load(None)?);
///
/// let sale = db.orders().confirm_order(&cashier, &order_id, PaymentMethod::Cash, paid).await?;
/// let stock = db.inventory().product_stock(&product_id, today).await?;
/// ```
#[derive(Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Decides which actor may run which workflow.
    authorizer: Arc<dyn Authorizer>,

    /// Refund windows and stock policy.
    store: StoreConfig,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("pool", &self.pool)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads (file databases only)
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    ///    - Busy timeout for queued writers
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    ///
    /// The handle starts with [`RolePolicy`] and default [`StoreConfig`].
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            // sqlite://path creates file if not exists
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Wal)
                .create_if_missing(true)
        };

        let connect_options = connect_options
            // Data is safe from corruption, may lose last transaction on crash
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(if config.is_in_memory() {
                None
            } else {
                Some(Duration::from_secs(30 * 60))
            })
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            authorizer: Arc::new(RolePolicy),
            store: StoreConfig::default(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Replaces the authorizer consulted by workflows.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Replaces the store configuration (refund windows, stock policy).
    pub fn with_store_config(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Runs database migrations.
    ///
    /// Called by `new()` when `run_migrations` is set. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For queries not covered by repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction holding SQLite's write lock from the start.
    pub async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    pub fn authorizer(&self) -> &dyn Authorizer {
        self.authorizer.as_ref()
    }

    pub fn store_config(&self) -> &StoreConfig {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Repositories (reads)
    // -------------------------------------------------------------------------

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn batches(&self) -> BatchRepository {
        BatchRepository::new(self.pool.clone())
    }

    pub fn stock_entries(&self) -> StockEntryRepository {
        StockEntryRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn order_records(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn sale_records(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    pub fn refunds(&self) -> RefundRepository {
        RefundRepository::new(self.pool.clone())
    }

    // -------------------------------------------------------------------------
    // Workflows (transactional writes)
    // -------------------------------------------------------------------------

    /// Order lifecycle: create, update, reject, resend, delete, confirm.
    pub fn orders(&self) -> OrderWorkflow {
        OrderWorkflow::new(self.clone())
    }

    /// Walk-in sales.
    pub fn sales(&self) -> SaleWorkflow {
        SaleWorkflow::new(self.clone())
    }

    /// Loan repayments and open balances.
    pub fn loans(&self) -> LoanWorkflow {
        LoanWorkflow::new(self.clone())
    }

    /// Item refunds, whole-sale refunds and their reversal.
    pub fn refund_workflow(&self) -> RefundWorkflow {
        RefundWorkflow::new(self.clone())
    }

    /// Catalogue, batches and the stock ledger.
    pub fn inventory(&self) -> InventoryWorkflow {
        InventoryWorkflow::new(self.clone())
    }

    /// Closes the database connection pool.
    ///
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::auth::AllowAll;
    use duka_core::{Actor, Capability, Role};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let on: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(on, 1);
    }

    #[tokio::test]
    async fn test_begin_write_rolls_back_on_drop() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut tx = db.begin_write().await.unwrap();
            sqlx::query("INSERT INTO categories (id, name) VALUES ('c1', 'Syrups')")
                .execute(&mut *tx)
                .await
                .unwrap();
        }
        assert!(db.products().categories().await.unwrap().is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_authorizer_swap() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let staff = Actor::new("s1", Role::Staff);
        assert!(!db.authorizer().has_capability(&staff, Capability::Refund));

        let db = db.with_authorizer(Arc::new(AllowAll));
        assert!(db.authorizer().has_capability(&staff, Capability::Refund));
    }
}
