//! # Database Error Types
//!
//! Error types for database operations and workflows.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Business rule (CoreError)           │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError::{NotFound, Unique...}    DbError::Domain(CoreError)          │
//! │       │                                  │                              │
//! │       └──────────────┬───────────────────┘                              │
//! │                      ▼                                                  │
//! │        Transaction dropped → ROLLBACK                                  │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │        DbError::report() → ErrorReport { kind, code, message }         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use duka_core::{CoreError, ErrorKind, ErrorReport, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and domain errors raised inside a
/// workflow, so a caller always gets one type back.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule refused the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate batch code for a product
    /// - Second sale for the same order
    /// - Second refund for the same sale item
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a product or batch that does not exist
    /// - Deleting a row other rows still point to
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. a batch quantity below zero).
    #[error("Constraint violation: {0}")]
    CheckViolation(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns the domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Machine-checkable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Domain(err) => err.kind(),
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } => ErrorKind::StateConflict,
            DbError::ForeignKeyViolation { .. } | DbError::CheckViolation(_) => {
                ErrorKind::Validation
            }
            DbError::PoolExhausted => ErrorKind::ResourceExhausted,
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable SCREAMING_SNAKE_CASE code.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Domain(err) => err.code(),
            DbError::NotFound { .. } => "NOT_FOUND",
            DbError::UniqueViolation { .. } => "DUPLICATE",
            DbError::ForeignKeyViolation { .. } => "FOREIGN_KEY_VIOLATION",
            DbError::CheckViolation(_) => "CONSTRAINT_VIOLATION",
            DbError::ConnectionFailed(_) => "CONNECTION_FAILED",
            DbError::MigrationFailed(_) => "MIGRATION_FAILED",
            DbError::QueryFailed(_) => "QUERY_FAILED",
            DbError::PoolExhausted => "POOL_EXHAUSTED",
            DbError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Builds the structured error handed to a request layer.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_keep_their_kind() {
        let err: DbError = CoreError::InsufficientStock {
            batch_code: "B-1".into(),
            available: 5,
            requested: 10,
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        let report = err.report();
        assert_eq!(report.code, "INSUFFICIENT_STOCK");
        assert_eq!(
            report.message,
            "Insufficient stock in batch B-1: available 5, requested 10"
        );
    }

    #[test]
    fn test_validation_converts_to_domain() {
        let err: DbError = ValidationError::EmptyItems.into();
        assert!(matches!(err.as_domain(), Some(CoreError::Validation(_))));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_storage_errors_are_internal() {
        assert_eq!(DbError::PoolExhausted.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(
            DbError::QueryFailed("database is locked".into()).kind(),
            ErrorKind::Internal
        );
        assert_eq!(DbError::not_found("Sale", "s1").kind(), ErrorKind::NotFound);
    }
}
