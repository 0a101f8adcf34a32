//! Error types for catalog operations.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by a [`crate::MetadataCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A key or foreign-key constraint was violated, e.g. a duplicate id.
    #[error("constraint violation on {table}: {message}")]
    ConstraintViolation {
        /// Table the offending row targeted.
        table: &'static str,
        /// Description of the violation.
        message: String,
    },

    /// No archive row with this id.
    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    /// A stored row could not be converted back into a record.
    #[error("invalid row in {table}: {message}")]
    InvalidRow {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The relational backend failed.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error, e.g. starting the runtime that drives the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Creates a constraint violation error.
    pub fn constraint(table: &'static str, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            table,
            message: message.into(),
        }
    }

    /// Creates an invalid row error.
    pub fn invalid_row(table: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            table,
            message: message.into(),
        }
    }

    /// Returns true for duplicate-id and foreign-key failures.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                let message = db_err.message().to_string();
                return Self::constraint(table_from_message(&message), message);
            }
        }
        Self::Database(err.to_string())
    }
}

/// SQLite reports e.g. `UNIQUE constraint failed: archives.id`.
fn table_from_message(message: &str) -> &'static str {
    use crate::schema::{archives, empty_directories, files};
    let qualified = message.rsplit(": ").next().unwrap_or_default();
    match qualified.split('.').next().unwrap_or_default() {
        archives::TABLE => archives::TABLE,
        files::TABLE => files::TABLE,
        empty_directories::TABLE => empty_directories::TABLE,
        _ => "catalog",
    }
}
