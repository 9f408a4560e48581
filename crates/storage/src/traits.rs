//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Suffix appended to a share id to form its blob key.
pub const BLOB_SUFFIX: &str = ".enc";

/// Opaque blob store for encrypted share payloads.
///
/// Implementations store bytes exactly as given: no transcoding, no
/// compression. A `read` after a successful `save` returns identical bytes,
/// and a `read` after `delete` returns `None`.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store `data` for the given id and return the key it was written under.
    ///
    /// The write is atomic: a concurrent reader sees either nothing or the
    /// complete payload.
    async fn save(&self, id: &str, data: Bytes) -> StorageResult<String>;

    /// Read a blob. Returns `Ok(None)` if no blob exists under `key`.
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Delete a blob. Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Static identifier for the backend type (e.g., "s3", "filesystem").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and usable.
    ///
    /// Called once at startup, before the engine accepts work.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Derive the blob key for a share id.
///
/// Ids must be a single non-empty path segment without dots, so a key can
/// never name anything outside the backend's namespace.
pub fn blob_key(id: &str) -> StorageResult<String> {
    if id.is_empty()
        || id.contains(['/', '\\', '.'])
        || id.chars().any(|c| c.is_control())
    {
        return Err(StorageError::InvalidKey(format!("invalid blob id: {id:?}")));
    }
    Ok(format!("{id}{BLOB_SUFFIX}"))
}
