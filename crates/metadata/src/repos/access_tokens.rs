//! Access token (QR grant) repository.

use crate::error::MetadataResult;
use crate::models::AccessTokenRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for single-use access grants.
#[async_trait]
pub trait AccessTokenRepo: Send + Sync {
    /// Store a grant. Fails with `NotFound` if the share no longer exists.
    async fn create_access_token(&self, token: &AccessTokenRow) -> MetadataResult<()>;

    /// Get a grant by token hash.
    async fn get_access_token(&self, token_hash: &str) -> MetadataResult<Option<AccessTokenRow>>;

    /// Consume a grant: delete it if it matches `share_id` and is unexpired
    /// at `now`, in one statement. Returns whether it was consumed.
    ///
    /// An expired grant with this hash is removed as a side effect. A grant
    /// presented for the wrong share is left in place.
    async fn redeem_access_token(
        &self,
        token_hash: &str,
        share_id: Uuid,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Delete every grant expired at `now`. Returns the number removed.
    async fn purge_expired_access_tokens(&self, now: OffsetDateTime) -> MetadataResult<u64>;
}
