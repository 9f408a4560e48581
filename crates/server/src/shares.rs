//! Share lifecycle state machine.
//!
//! [`FileShareStore`] is the only component that mutates a share's download
//! counter or status. It coordinates the blob store and the metadata store
//! so that:
//!
//! - a record is never visible before its blob exists (blob first, then
//!   record);
//! - a dead share is never served: every download re-evaluates liveness and
//!   claims its slot with a conditional update;
//! - the download that exhausts a quota still receives its bytes, and the
//!   share is removed right after.
//!
//! Metadata probes ([`FileShareStore::get_metadata`]) only record status.
//! Removal happens on the download and sweep paths. Both use
//! [`Liveness::evaluate`].

use crate::error::{ShareError, ShareResult};
use crate::metrics;
use bytes::Bytes;
use sharebox_core::{
    CreateShareRequest, CreatedShare, ExpiryRequest, Liveness, ShareId, ShareMetadata,
    ShareStatus, ShareSummary, Tier, TierPolicy, clock,
};
use sharebox_metadata::MetadataStore;
use sharebox_metadata::models::ShareRow;
use sharebox_storage::BlobStore;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Bytes and filename handed back by a successful download.
#[derive(Clone, Debug)]
pub struct Download {
    pub bytes: Bytes,
    pub filename: String,
}

/// Why a share is being removed. Used for logs and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RemovalReason {
    Expired,
    LimitReached,
    Deleted,
}

impl RemovalReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::LimitReached => "limit_reached",
            Self::Deleted => "deleted",
        }
    }

    fn from_liveness(liveness: Liveness) -> Self {
        match liveness {
            Liveness::LimitReached => Self::LimitReached,
            _ => Self::Expired,
        }
    }
}

/// Error reported to a caller who found the share dead.
fn dead_error(id: ShareId, liveness: Liveness) -> ShareError {
    match liveness {
        Liveness::LimitReached => ShareError::LimitReached(id.to_string()),
        _ => ShareError::Expired(id.to_string()),
    }
}

fn not_found(id: ShareId) -> ShareError {
    ShareError::NotFound(id.to_string())
}

fn require_present(field: &str, value: &str) -> ShareResult<()> {
    if value.trim().is_empty() {
        return Err(ShareError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// How long a download that found no blob waits before re-reading the
/// record, so that a concurrent delete can finish.
const MISSING_BLOB_RECHECK_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

/// Owner of the share lifecycle.
pub struct FileShareStore {
    storage: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    policy: TierPolicy,
    sweep_batch_size: u32,
}

impl FileShareStore {
    pub fn new(
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        policy: TierPolicy,
        sweep_batch_size: u32,
    ) -> Self {
        Self {
            storage,
            metadata,
            policy,
            sweep_batch_size: sweep_batch_size.max(1),
        }
    }

    /// Validate an upload against the tier policy, store the payload, then
    /// record the share.
    ///
    /// Nothing is written unless every check passes. If recording fails the
    /// blob just written is removed again.
    pub async fn create(
        &self,
        payload: Bytes,
        request: CreateShareRequest,
    ) -> ShareResult<CreatedShare> {
        let tier = Tier::parse(&request.tier)?;
        require_present("original_filename", &request.original_filename)?;
        require_present("salt", &request.salt)?;
        require_present("iv", &request.iv)?;

        let size = payload.len() as u64;
        if let Some(declared) = request.size
            && declared != size
        {
            return Err(ShareError::Validation(format!(
                "declared size {declared} does not match payload size {size}"
            )));
        }
        self.policy.check_size(tier, size)?;

        let expiry = match (request.expires_at, request.expires_in_hours) {
            (Some(_), Some(_)) => {
                return Err(ShareError::Validation(
                    "specify either expires_at or expires_in_hours, not both".to_string(),
                ));
            }
            (Some(at), None) => ExpiryRequest::At(at),
            (None, Some(hours)) => ExpiryRequest::InHours(hours),
            (None, None) => ExpiryRequest::TierMaximum,
        };
        let now = clock::now();
        let expires_at = self.policy.resolve_expiry(tier, now, expiry)?;
        let max_downloads = self
            .policy
            .resolve_max_downloads(tier, request.max_downloads)?;

        let share_id = ShareId::new();
        let size_bytes = i64::try_from(size)
            .map_err(|_| ShareError::Validation(format!("file size {size} is too large")))?;

        let storage_key = self
            .storage
            .save(&share_id.to_string(), payload)
            .await?;

        let row = ShareRow {
            share_id: *share_id.as_uuid(),
            original_filename: request.original_filename,
            size_bytes,
            owner_tag: request.owner_tag,
            tier: tier.as_str().to_string(),
            status: ShareStatus::Active.as_str().to_string(),
            created_at: now,
            expires_at,
            max_downloads: max_downloads.map(i64::from),
            download_count: 0,
            storage_key,
            salt: request.salt,
            iv: request.iv,
        };

        if let Err(e) = self.metadata.create_share(&row).await {
            if let Err(cleanup) = self.storage.delete(&row.storage_key).await {
                tracing::warn!(
                    share_id = %share_id,
                    error = %cleanup,
                    "Failed to remove blob after record insert failed; blob is orphaned"
                );
            }
            return Err(e.into());
        }

        metrics::SHARES_CREATED
            .with_label_values(&[tier.as_str()])
            .inc();
        tracing::info!(
            share_id = %share_id,
            tier = %tier,
            size = size,
            expires_at = %expires_at,
            max_downloads = ?max_downloads,
            "Share created"
        );

        Ok(CreatedShare {
            share_id,
            tier,
            expires_at,
            max_downloads,
            size,
        })
    }

    /// Metadata for a recipient. Records an expired or exhausted status but
    /// never removes anything.
    pub async fn get_metadata(&self, id: ShareId) -> ShareResult<ShareMetadata> {
        let row = self
            .metadata
            .get_share(*id.as_uuid())
            .await?
            .ok_or_else(|| not_found(id))?;

        let liveness = row.liveness(clock::now());
        if !liveness.is_live()
            && row.status()? == ShareStatus::Active
            && self
                .metadata
                .mark_share_status(row.share_id, liveness.status())
                .await?
        {
            tracing::debug!(
                share_id = %id,
                status = liveness.status().as_str(),
                "Recorded share status on metadata fetch"
            );
        }

        Ok(ShareMetadata {
            share_id: id,
            size: row.size(),
            tier: row.tier()?,
            status: liveness.status(),
            created_at: row.created_at,
            expires_at: row.expires_at,
            max_downloads: row.max_downloads,
            remaining_downloads: liveness.remaining_downloads(row.max_downloads, row.download_count),
            original_filename: row.original_filename,
            salt: row.salt,
            iv: row.iv,
        })
    }

    /// Serve one download.
    ///
    /// Fails with `Expired`/`LimitReached` (removing the share) if it is no
    /// longer live, and with `NotFound` if it is unknown. A caller only
    /// receives bytes after its download was counted by the conditional
    /// claim. If that download meets the quota the share is removed before
    /// returning.
    pub async fn consume(&self, id: ShareId) -> ShareResult<Download> {
        let row = self
            .metadata
            .get_share(*id.as_uuid())
            .await?
            .ok_or_else(|| not_found(id))?;

        let liveness = row.liveness(clock::now());
        if !liveness.is_live() {
            self.remove_dead(&row, liveness).await;
            return Err(dead_error(id, liveness));
        }

        let bytes = match self.storage.read(&row.storage_key).await? {
            Some(bytes) => bytes,
            None => return Err(self.missing_blob(id).await),
        };

        let claimed = match self
            .metadata
            .claim_download(row.share_id, clock::now())
            .await?
        {
            Some(claimed) => claimed,
            None => return Err(self.lost_claim(id).await),
        };
        metrics::DOWNLOADS_SERVED.inc();

        if let Some(max) = claimed.max_downloads
            && claimed.download_count >= max
        {
            tracing::info!(
                share_id = %id,
                downloads = claimed.download_count,
                "Download quota exhausted, removing share"
            );
            if let Err(e) = self.remove(&claimed, RemovalReason::LimitReached).await {
                // Already dead by predicate, so it can never be served again.
                tracing::error!(
                    share_id = %id,
                    error = %e,
                    "Failed to remove exhausted share; leaving it to the sweeper"
                );
            }
        }

        Ok(Download {
            bytes,
            filename: claimed.original_filename,
        })
    }

    /// Delete a share. Deleting an unknown id succeeds.
    pub async fn delete(&self, id: ShareId) -> ShareResult<()> {
        let Some(row) = self.metadata.get_share(*id.as_uuid()).await? else {
            return Ok(());
        };
        self.remove(&row, RemovalReason::Deleted).await?;
        Ok(())
    }

    /// Remove every share that is expired or has met its quota.
    ///
    /// Individual failures are logged and skipped. Returns how many shares
    /// this call actually removed.
    pub async fn sweep_expired(&self) -> ShareResult<u64> {
        let mut removed = 0u64;
        let mut failed: HashSet<Uuid> = HashSet::new();

        loop {
            let limit = self
                .sweep_batch_size
                .saturating_add(u32::try_from(failed.len()).unwrap_or(u32::MAX));
            let now = clock::now();
            let batch = self.metadata.list_dead_shares(now, limit).await?;

            let candidates: Vec<&ShareRow> = batch
                .iter()
                .filter(|row| !failed.contains(&row.share_id))
                .collect();
            if candidates.is_empty() {
                break;
            }

            let mut progressed = false;
            for row in candidates {
                let reason = RemovalReason::from_liveness(row.liveness(now));
                match self.remove(row, reason).await {
                    Ok(true) => {
                        removed += 1;
                        progressed = true;
                    }
                    // Someone else removed it first.
                    Ok(false) => progressed = true,
                    Err(e) => {
                        metrics::SWEEP_FAILURES.inc();
                        tracing::warn!(
                            share_id = %row.share_id,
                            error = %e,
                            "Failed to remove dead share during sweep, skipping"
                        );
                        failed.insert(row.share_id);
                    }
                }
            }

            if !progressed || batch.len() < limit as usize {
                break;
            }
        }

        if !failed.is_empty() {
            tracing::warn!(
                removed = removed,
                failed = failed.len(),
                "Sweep finished with failures"
            );
        }
        Ok(removed)
    }

    /// Every share, newest first, with the status it has right now.
    pub async fn list_all(&self) -> ShareResult<Vec<ShareSummary>> {
        let now = clock::now();
        self.metadata
            .list_shares()
            .await?
            .into_iter()
            .map(|row| {
                let liveness = row.liveness(now);
                Ok(ShareSummary {
                    share_id: row.id(),
                    size: row.size(),
                    tier: row.tier()?,
                    status: liveness.status(),
                    created_at: row.created_at,
                    expires_at: row.expires_at,
                    max_downloads: row.max_downloads,
                    downloads_used: row.download_count,
                    original_filename: row.original_filename,
                    owner_tag: row.owner_tag,
                })
            })
            .collect()
    }

    /// Remove blob, then record. A blob failure leaves the record intact so
    /// the removal can be retried. Returns whether the record still existed.
    async fn remove(&self, row: &ShareRow, reason: RemovalReason) -> ShareResult<bool> {
        self.storage.delete(&row.storage_key).await?;

        let existed = self
            .metadata
            .delete_share(row.share_id)
            .await
            .map_err(|source| ShareError::PartialDelete {
                share_id: row.share_id.to_string(),
                source,
            })?;

        if existed {
            metrics::SHARES_REMOVED
                .with_label_values(&[reason.as_str()])
                .inc();
            tracing::info!(
                share_id = %row.share_id,
                reason = reason.as_str(),
                "Share removed"
            );
        }
        Ok(existed)
    }

    /// Remove a share found dead on the download path. The caller reports
    /// the dead state either way; a failed removal is left to the sweeper.
    async fn remove_dead(&self, row: &ShareRow, liveness: Liveness) {
        if let Err(e) = self
            .remove(row, RemovalReason::from_liveness(liveness))
            .await
        {
            tracing::warn!(
                share_id = %row.share_id,
                error = %e,
                "Failed to remove dead share on download; leaving it to the sweeper"
            );
        }
    }

    /// The blob was missing. Decide whether another caller removed the share
    /// under us or whether a live record has lost its blob.
    async fn missing_blob(&self, id: ShareId) -> ShareError {
        let row = match self.metadata.get_share(*id.as_uuid()).await {
            Ok(Some(row)) => row,
            Ok(None) => return not_found(id),
            Err(e) => return e.into(),
        };
        let liveness = row.liveness(clock::now());
        if !liveness.is_live() {
            self.remove_dead(&row, liveness).await;
            return dead_error(id, liveness);
        }

        // An explicit delete removes the blob before the record, so a live
        // record may only mean the delete has not finished yet.
        tokio::time::sleep(MISSING_BLOB_RECHECK_DELAY).await;
        match self.metadata.get_share(*id.as_uuid()).await {
            Ok(None) => {
                tracing::warn!(share_id = %id, "Share was deleted during download");
                not_found(id)
            }
            Ok(Some(row)) => {
                let liveness = row.liveness(clock::now());
                if liveness.is_live() {
                    metrics::INTEGRITY_FAULTS.inc();
                    tracing::error!(
                        share_id = %id,
                        storage_key = %row.storage_key,
                        "Integrity fault: live share record has no blob"
                    );
                    not_found(id)
                } else {
                    self.remove_dead(&row, liveness).await;
                    dead_error(id, liveness)
                }
            }
            Err(e) => e.into(),
        }
    }

    /// The conditional claim matched nothing: another caller exhausted,
    /// expired or removed the share between our check and our claim.
    async fn lost_claim(&self, id: ShareId) -> ShareError {
        match self.metadata.get_share(*id.as_uuid()).await {
            Ok(None) => not_found(id),
            Ok(Some(row)) => {
                let liveness = row.liveness(clock::now());
                if liveness.is_live() {
                    tracing::warn!(share_id = %id, "Download claim rejected for a live share");
                    not_found(id)
                } else {
                    self.remove_dead(&row, liveness).await;
                    dead_error(id, liveness)
                }
            }
            Err(e) => e.into(),
        }
    }
}
