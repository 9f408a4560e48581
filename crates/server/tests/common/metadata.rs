//! Metadata store test utilities.

use async_trait::async_trait;
use sharebox_core::ShareStatus;
use sharebox_metadata::models::{AccessTokenRow, ShareRow};
use sharebox_metadata::repos::{AccessTokenRepo, ShareRepo};
use sharebox_metadata::{MetadataError, MetadataResult, MetadataStore, SqliteStore};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A test metadata store wrapper that cleans up on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    pub(crate) sqlite_store: Arc<SqliteStore>,
    _temp_dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestMetadata {
    /// Create a new test metadata store in its own temporary directory.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut metadata = Self::at(&temp_dir.path().join("test.db")).await?;
        metadata._temp_dir = Some(temp_dir);
        Ok(metadata)
    }

    /// Open a store at `path`; the caller owns the directory.
    pub async fn at(path: &Path) -> MetadataResult<Self> {
        let store = Arc::new(SqliteStore::new(path, None).await?);
        Ok(Self {
            store: store.clone(),
            sqlite_store: store,
            _temp_dir: None,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    /// Get a reference to the SQLite connection pool for raw queries.
    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }
}

/// Metadata store wrapper whose record deletes can be made to fail.
#[allow(dead_code)]
pub struct FlakyMetadata {
    inner: Arc<dyn MetadataStore>,
    pub fail_share_deletes: AtomicBool,
}

#[allow(dead_code)]
impl FlakyMetadata {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_share_deletes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_share_deletes(&self, fail: bool) {
        self.fail_share_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShareRepo for FlakyMetadata {
    async fn create_share(&self, share: &ShareRow) -> MetadataResult<()> {
        self.inner.create_share(share).await
    }

    async fn get_share(&self, share_id: Uuid) -> MetadataResult<Option<ShareRow>> {
        self.inner.get_share(share_id).await
    }

    async fn claim_download(
        &self,
        share_id: Uuid,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<ShareRow>> {
        self.inner.claim_download(share_id, now).await
    }

    async fn mark_share_status(&self, share_id: Uuid, status: ShareStatus) -> MetadataResult<bool> {
        self.inner.mark_share_status(share_id, status).await
    }

    async fn delete_share(&self, share_id: Uuid) -> MetadataResult<bool> {
        if self.fail_share_deletes.load(Ordering::SeqCst) {
            return Err(MetadataError::Internal(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete_share(share_id).await
    }

    async fn list_dead_shares(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<ShareRow>> {
        self.inner.list_dead_shares(now, limit).await
    }

    async fn list_shares(&self) -> MetadataResult<Vec<ShareRow>> {
        self.inner.list_shares().await
    }
}

#[async_trait]
impl AccessTokenRepo for FlakyMetadata {
    async fn create_access_token(&self, token: &AccessTokenRow) -> MetadataResult<()> {
        self.inner.create_access_token(token).await
    }

    async fn get_access_token(&self, token_hash: &str) -> MetadataResult<Option<AccessTokenRow>> {
        self.inner.get_access_token(token_hash).await
    }

    async fn redeem_access_token(
        &self,
        token_hash: &str,
        share_id: Uuid,
        now: OffsetDateTime,
    ) -> MetadataResult<bool> {
        self.inner
            .redeem_access_token(token_hash, share_id, now)
            .await
    }

    async fn purge_expired_access_tokens(&self, now: OffsetDateTime) -> MetadataResult<u64> {
        self.inner.purge_expired_access_tokens(now).await
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadata {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
