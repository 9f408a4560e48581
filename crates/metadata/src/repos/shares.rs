//! Share repository.

use crate::error::MetadataResult;
use crate::models::ShareRow;
use async_trait::async_trait;
use sharebox_core::ShareStatus;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for share records.
///
/// Every check-then-act step is a single conditional statement, so
/// concurrent callers on the same share cannot both win.
#[async_trait]
pub trait ShareRepo: Send + Sync {
    /// Insert a new share. Fails with `AlreadyExists` on an id collision.
    async fn create_share(&self, share: &ShareRow) -> MetadataResult<()>;

    /// Get a share by ID.
    async fn get_share(&self, share_id: Uuid) -> MetadataResult<Option<ShareRow>>;

    /// Atomically count one download if the share is still live at `now`.
    ///
    /// Returns the updated row, or `None` if the share is gone, expired or
    /// already at its quota. When the increment meets the quota the status
    /// is set to `limit_reached` in the same statement.
    async fn claim_download(
        &self,
        share_id: Uuid,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<ShareRow>>;

    /// Record a terminal status, only if the share is still marked active.
    /// Returns whether a row changed.
    async fn mark_share_status(&self, share_id: Uuid, status: ShareStatus)
    -> MetadataResult<bool>;

    /// Delete a share and its access tokens. Returns whether the share
    /// existed.
    async fn delete_share(&self, share_id: Uuid) -> MetadataResult<bool>;

    /// Shares that are expired at `now` or have met their quota, oldest
    /// expiry first.
    async fn list_dead_shares(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<ShareRow>>;

    /// All shares, newest first.
    async fn list_shares(&self) -> MetadataResult<Vec<ShareRow>>;
}
