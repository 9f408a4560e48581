//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use sharebox_core::{Liveness, ShareId, ShareStatus, Tier};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Share record.
///
/// Timestamps are whole UTC seconds (see `sharebox_core::clock`).
#[derive(Debug, Clone, FromRow)]
pub struct ShareRow {
    pub share_id: Uuid,
    pub original_filename: String,
    pub size_bytes: i64,
    pub owner_tag: Option<String>,
    pub tier: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    /// `None` means unlimited.
    pub max_downloads: Option<i64>,
    pub download_count: i64,
    pub storage_key: String,
    pub salt: String,
    pub iv: String,
}

impl ShareRow {
    pub fn id(&self) -> ShareId {
        ShareId::from_uuid(self.share_id)
    }

    /// Evaluate the shared liveness predicate for this record.
    pub fn liveness(&self, now: OffsetDateTime) -> Liveness {
        Liveness::evaluate(
            self.expires_at,
            self.max_downloads,
            self.download_count,
            now,
        )
    }

    pub fn tier(&self) -> MetadataResult<Tier> {
        Tier::parse(&self.tier).map_err(|e| {
            MetadataError::Internal(format!("share {} has corrupt tier: {e}", self.share_id))
        })
    }

    pub fn status(&self) -> MetadataResult<ShareStatus> {
        ShareStatus::parse(&self.status).map_err(|e| {
            MetadataError::Internal(format!("share {} has corrupt status: {e}", self.share_id))
        })
    }

    pub fn size(&self) -> u64 {
        u64::try_from(self.size_bytes).unwrap_or(0)
    }
}

/// Single-use access grant. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct AccessTokenRow {
    pub token_hash: String,
    pub share_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}
