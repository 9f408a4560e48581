//! Storage test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use sharebox_storage::{BlobStore, FilesystemBackend, StorageError, StorageResult};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A test storage wrapper that cleans up on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestStorage {
    pub backend: Arc<dyn BlobStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStorage {
    /// Create a new test storage with a temporary directory.
    pub async fn new() -> StorageResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path()).await?;

        Ok(Self {
            backend: Arc::new(backend),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn BlobStore> {
        self.backend.clone()
    }
}

/// Blob store wrapper with switchable faults and counters.
#[allow(dead_code)]
pub struct FaultyStorage {
    inner: Arc<dyn BlobStore>,
    pub fail_saves: AtomicBool,
    pub fail_deletes: AtomicBool,
    fail_delete_keys: Mutex<HashSet<String>>,
    read_delay: Mutex<Option<Duration>>,
    pub saves: AtomicU64,
    pub reads: AtomicU64,
    pub deletes: AtomicU64,
}

#[allow(dead_code)]
impl FaultyStorage {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            fail_saves: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_delete_keys: Mutex::new(HashSet::new()),
            read_delay: Mutex::new(None),
            saves: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> Arc<dyn BlobStore> {
        self.inner.clone()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Fail deletes of one key only.
    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete_keys.lock().unwrap().insert(key.to_string());
    }

    /// Hold every read for `delay` before returning, to widen race windows.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock().unwrap() = delay;
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FaultyStorage {
    async fn save(&self, id: &str, data: Bytes) -> StorageResult<String> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected save failure".to_string()));
        }
        self.inner.save(id, data).await
    }

    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        let result = self.inner.read(key).await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst)
            || self.fail_delete_keys.lock().unwrap().contains(key)
        {
            return Err(StorageError::Unavailable(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
