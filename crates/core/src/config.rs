//! Configuration types shared across crates.

use crate::tier::TierPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Blob storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for encrypted blobs.
        path: PathBuf,
    },
    /// S3-compatible object storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient AWS credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient AWS credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err("filesystem storage requires a path".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long a writer waits on a locked database before failing.
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

/// Background cleanup sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Run the periodic sweep (default: true).
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    /// Seconds between sweep runs (default: 1 hour).
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// Dead shares fetched per batch.
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: u32,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_sweep_batch_size() -> u32 {
    500
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval_secs(),
            batch_size: default_sweep_batch_size(),
        }
    }
}

impl SweepConfig {
    /// Interval between runs as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("sweep.interval_secs must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("sweep.batch_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// QR access-grant configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QrConfig {
    /// Lifetime used when the caller does not ask for one (default: 5 minutes).
    #[serde(default = "default_qr_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Upper bound on any requested lifetime (default: 1 hour).
    #[serde(default = "default_qr_max_ttl_secs")]
    pub max_ttl_secs: u64,
}

/// Longest lifetime an access grant may be configured with (30 days).
pub const MAX_QR_TTL_SECS: u64 = 30 * 24 * 3600;

fn default_qr_ttl_secs() -> u64 {
    300
}

fn default_qr_max_ttl_secs() -> u64 {
    3600
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_qr_ttl_secs(),
            max_ttl_secs: default_qr_max_ttl_secs(),
        }
    }
}

impl QrConfig {
    /// Resolve a requested lifetime, clamped to `[1, max_ttl_secs]`.
    pub fn ttl(&self, requested_secs: Option<u64>) -> time::Duration {
        let secs = requested_secs
            .unwrap_or(self.default_ttl_secs)
            .clamp(1, self.max_ttl_secs.max(1));
        time::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_secs == 0 || self.max_ttl_secs == 0 {
            return Err("qr ttl values must be greater than 0".to_string());
        }
        if self.max_ttl_secs > MAX_QR_TTL_SECS {
            return Err(format!("qr.max_ttl_secs must be at most {MAX_QR_TTL_SECS}"));
        }
        if self.default_ttl_secs > self.max_ttl_secs {
            return Err("qr.default_ttl_secs must not exceed qr.max_ttl_secs".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Blob storage backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Per-tier limits.
    #[serde(default)]
    pub tiers: TierPolicy,
    /// Background cleanup sweep.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// QR access grants.
    #[serde(default)]
    pub qr: QrConfig,
}

impl AppConfig {
    /// Create a test configuration rooted in `dir`.
    ///
    /// **For testing only.** Uses filesystem storage and SQLite metadata
    /// under the given directory, with the background sweep disabled.
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            storage: StorageConfig::Filesystem {
                path: dir.join("blobs"),
            },
            metadata: MetadataConfig::Sqlite {
                path: dir.join("metadata.db"),
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            tiers: TierPolicy::default(),
            sweep: SweepConfig {
                enabled: false,
                ..SweepConfig::default()
            },
            qr: QrConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.tiers.validate()?;
        self.sweep.validate()?;
        self.qr.validate()
    }
}
