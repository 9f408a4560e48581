//! Engine error types.

use http::StatusCode;
use serde::Serialize;
use sharebox_metadata::MetadataError;
use sharebox_storage::StorageError;

/// Error body a transport layer can serialize.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Share lifecycle error type.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("share not found: {0}")]
    NotFound(String),

    #[error("share has expired: {0}")]
    Expired(String),

    #[error("share download limit reached: {0}")]
    LimitReached(String),

    #[error("invalid or expired access token")]
    InvalidAccessToken,

    #[error("share {share_id}: blob removed but record delete failed: {source}")]
    PartialDelete {
        share_id: String,
        #[source]
        source: MetadataError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl From<sharebox_core::Error> for ShareError {
    fn from(err: sharebox_core::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ShareError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Expired(_) => "expired",
            Self::LimitReached(_) => "limit_reached",
            Self::InvalidAccessToken => "invalid_access_token",
            Self::PartialDelete { .. } => "partial_delete",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code a transport should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Expired(_) | Self::LimitReached(_) => StatusCode::GONE,
            Self::InvalidAccessToken => StatusCode::UNAUTHORIZED,
            Self::PartialDelete { .. }
            | Self::Storage(_)
            | Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the outcomes that mean "this share can no longer be served".
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Expired(_) | Self::LimitReached(_)
        )
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type ShareResult<T> = std::result::Result<T, ShareError>;
