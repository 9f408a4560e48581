//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Classify a failed write, turning constraint failures into typed
    /// variants and leaving everything else as a database error.
    pub(crate) fn from_write(err: sqlx::Error, what: impl std::fmt::Display) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::AlreadyExists(what.to_string());
            }
            if db_err.is_foreign_key_violation() {
                return Self::NotFound(what.to_string());
            }
            if db_err.is_check_violation() {
                return Self::Constraint(format!("{what}: {}", db_err.message()));
            }
        }
        Self::Database(err)
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
