//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid share id: {0}")]
    InvalidShareId(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("unknown share status: {0}")]
    UnknownStatus(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
