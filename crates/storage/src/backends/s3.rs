//! S3-compatible blob backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobStore, blob_key};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use bytes::Bytes;
use std::time::Duration;
use tracing::instrument;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// S3-compatible blob store.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Whether an SDK error is an HTTP 404 from the service.
fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 404)
}

fn map_sdk_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

/// Accept bare `host:port` endpoints (e.g. "minio:9000") by assuming http.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// Strip trailing slashes so keys never contain `prefix//key`. An empty
/// prefix is the same as none.
fn normalize_prefix(prefix: Option<String>) -> Option<String> {
    prefix
        .map(|p| p.trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty())
}

fn prefixed_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// When no explicit credentials are given the ambient AWS credential
    /// chain is used. `force_path_style` is required for MinIO and most
    /// S3-compatible services.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() ^ secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));

        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                key_id,
                secret,
                None,
                None,
                "sharebox-config",
            ));
        }

        if let Some(endpoint) = endpoint.as_deref() {
            loader = loader.endpoint_url(normalize_endpoint(endpoint));
        }

        let sdk_config = loader.load().await;
        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if force_path_style {
            s3_config = s3_config.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config.build()),
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
        })
    }

    /// Full object key (applies prefix if configured).
    fn full_key(&self, key: &str) -> String {
        prefixed_key(self.prefix.as_deref(), key)
    }
}

#[async_trait]
impl BlobStore for S3Backend {
    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn save(&self, id: &str, data: Bytes) -> StorageResult<String> {
        let key = blob_key(id)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(&key))
            .body(data.into())
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(key)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(map_sdk_error(err)),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();
        Ok(Some(bytes))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        // S3 reports success for missing keys; some compatible services 404.
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(map_sdk_error(err)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let probe = self.client.head_bucket().bucket(&self.bucket).send();
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) if is_not_found(&err) => Err(StorageError::Config(format!(
                "bucket does not exist: {}",
                self.bucket
            ))),
            Ok(Err(err)) => Err(map_sdk_error(err)),
            Err(_) => Err(StorageError::Unavailable(format!(
                "S3 health check timed out after {}s",
                HEALTH_CHECK_TIMEOUT.as_secs()
            ))),
        }
    }
}
