//! Wiring of the engine components.

use crate::qr::QrTokenIssuer;
use crate::service::ShareService;
use crate::shares::FileShareStore;
use crate::sweeper::CleanupSweeper;
use sharebox_core::config::AppConfig;
use sharebox_metadata::MetadataStore;
use sharebox_storage::BlobStore;
use std::sync::Arc;

/// Everything a transport or the daemon needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub shares: Arc<FileShareStore>,
    pub tokens: Arc<QrTokenIssuer>,
    pub service: ShareService,
    pub sweeper: Arc<CleanupSweeper>,
}

impl AppState {
    /// Create application state from already-initialized backends.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let shares = Arc::new(FileShareStore::new(
            storage.clone(),
            metadata.clone(),
            config.tiers.clone(),
            config.sweep.batch_size,
        ));
        let tokens = Arc::new(QrTokenIssuer::new(metadata.clone(), config.qr.clone()));
        let service = ShareService::new(shares.clone(), tokens.clone());
        let sweeper = Arc::new(CleanupSweeper::new(
            shares.clone(),
            tokens.clone(),
            config.sweep.interval(),
        ));

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            shares,
            tokens,
            service,
            sweeper,
        }
    }
}
