//! Test fixtures: payloads, upload requests and a wired-up engine.

use super::metadata::{FlakyMetadata, TestMetadata};
use super::storage::FaultyStorage;
use bytes::Bytes;
use sharebox_core::config::AppConfig;
use sharebox_core::{CreateShareRequest, ShareId, ShareStatus, Tier, clock};
use sharebox_metadata::MetadataStore;
use sharebox_metadata::models::ShareRow;
use sharebox_server::AppState;
use sharebox_storage::{BlobStore, FilesystemBackend};
use std::sync::Arc;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Minimal valid upload request for `tier`.
#[allow(dead_code)]
pub fn share_request(tier: &str) -> CreateShareRequest {
    CreateShareRequest {
        original_filename: "report.pdf".to_string(),
        size: None,
        tier: tier.to_string(),
        expires_at: None,
        expires_in_hours: None,
        max_downloads: None,
        salt: "c2FsdHNhbHRzYWx0c2FsdA".to_string(),
        iv: "aXZpdml2aXZpdml2".to_string(),
        owner_tag: None,
    }
}

/// A full engine on a temporary directory, with fault injection on both
/// backends.
#[allow(dead_code)]
pub struct TestEngine {
    pub state: AppState,
    pub storage: Arc<FaultyStorage>,
    pub metadata: Arc<FlakyMetadata>,
    pub sqlite: TestMetadata,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestEngine {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build an engine after letting the caller adjust the test config.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing(temp_dir.path());
        adjust(&mut config);

        let backend = FilesystemBackend::new(temp_dir.path().join("blobs"))
            .await
            .expect("Failed to create blob store");
        let storage = Arc::new(FaultyStorage::new(Arc::new(backend)));

        let sqlite = TestMetadata::at(&temp_dir.path().join("metadata.db"))
            .await
            .expect("Failed to create metadata store");
        let metadata = Arc::new(FlakyMetadata::new(sqlite.store()));

        let state = AppState::new(
            config,
            storage.clone() as Arc<dyn BlobStore>,
            metadata.clone() as Arc<dyn MetadataStore>,
        );

        Self {
            state,
            storage,
            metadata,
            sqlite,
            _temp_dir: temp_dir,
        }
    }

    /// Upload `payload` with the default request for `tier`.
    pub async fn upload(&self, tier: &str, payload: Bytes) -> ShareId {
        self.state
            .service
            .upload(payload, share_request(tier))
            .await
            .expect("upload failed")
            .share_id
    }

    /// Insert a share directly, bypassing tier validation, so tests can
    /// create shares that are already expired or exhausted.
    pub async fn insert_share(
        &self,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
        max_downloads: Option<i64>,
        download_count: i64,
        payload: Bytes,
    ) -> ShareId {
        let id = ShareId::new();
        let storage_key = self
            .storage
            .save(&id.to_string(), payload.clone())
            .await
            .expect("blob save failed");

        let row = ShareRow {
            share_id: *id.as_uuid(),
            original_filename: "inserted.bin".to_string(),
            size_bytes: payload.len() as i64,
            owner_tag: None,
            tier: Tier::Pro.as_str().to_string(),
            status: ShareStatus::Active.as_str().to_string(),
            created_at: clock::truncate(created_at),
            expires_at: clock::truncate(expires_at),
            max_downloads,
            download_count,
            storage_key,
            salt: "salt".to_string(),
            iv: "iv".to_string(),
        };
        self.sqlite
            .store()
            .create_share(&row)
            .await
            .expect("share insert failed");
        id
    }

    /// Insert a share whose expiry passed an hour ago.
    pub async fn insert_expired(&self, payload: Bytes) -> ShareId {
        let now = clock::now();
        self.insert_share(now - Duration::hours(2), now - Duration::hours(1), None, 0, payload)
            .await
    }

    /// Insert an unexpired share that has already met its quota.
    pub async fn insert_exhausted(&self, payload: Bytes) -> ShareId {
        let now = clock::now();
        self.insert_share(now - Duration::hours(1), now + Duration::hours(1), Some(1), 1, payload)
            .await
    }

    pub async fn share_exists(&self, id: ShareId) -> bool {
        self.sqlite
            .store()
            .get_share(*id.as_uuid())
            .await
            .expect("share lookup failed")
            .is_some()
    }

    pub async fn blob_exists(&self, id: ShareId) -> bool {
        let key = sharebox_storage::blob_key(&id.to_string()).expect("invalid id");
        self.storage
            .inner()
            .read(&key)
            .await
            .expect("blob read failed")
            .is_some()
    }

    pub async fn share_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM shares")
            .fetch_one(self.sqlite.pool())
            .await
            .expect("count failed")
    }

    pub async fn token_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM access_tokens")
            .fetch_one(self.sqlite.pool())
            .await
            .expect("count failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let a = seeded_bytes(42, 100);
        let b = seeded_bytes(42, 100);
        assert_eq!(a, b);

        let c = seeded_bytes(43, 100);
        assert_ne!(a, c);
    }
}
