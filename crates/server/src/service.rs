//! Operations a transport layer exposes.
//!
//! [`ShareService`] takes raw ids and optional grant tokens as a request
//! handler would receive them and routes them to the lifecycle store and the
//! grant issuer.

use crate::error::{ShareError, ShareResult};
use crate::qr::{IssuedToken, QrTokenIssuer};
use crate::shares::{Download, FileShareStore};
use bytes::Bytes;
use sharebox_core::{CreateShareRequest, CreatedShare, ShareId, ShareMetadata, ShareSummary};
use std::sync::Arc;

#[derive(Clone)]
pub struct ShareService {
    shares: Arc<FileShareStore>,
    tokens: Arc<QrTokenIssuer>,
}

impl ShareService {
    pub fn new(shares: Arc<FileShareStore>, tokens: Arc<QrTokenIssuer>) -> Self {
        Self { shares, tokens }
    }

    pub async fn upload(
        &self,
        payload: Bytes,
        request: CreateShareRequest,
    ) -> ShareResult<CreatedShare> {
        self.shares.create(payload, request).await
    }

    pub async fn metadata(&self, id: &str) -> ShareResult<ShareMetadata> {
        self.shares.get_metadata(parse_id(id)?).await
    }

    /// Download a share. When `token` is given it must redeem for this share
    /// before the file is read; a spent grant stays spent even if the
    /// download then fails.
    pub async fn download(&self, id: &str, token: Option<&str>) -> ShareResult<Download> {
        let id = parse_id(id)?;
        if let Some(token) = token
            && !self.tokens.redeem(token, id).await?
        {
            return Err(ShareError::InvalidAccessToken);
        }
        self.shares.consume(id).await
    }

    pub async fn delete(&self, id: &str) -> ShareResult<()> {
        self.shares.delete(parse_id(id)?).await
    }

    pub async fn issue_access_token(
        &self,
        id: &str,
        ttl_secs: Option<u64>,
    ) -> ShareResult<IssuedToken> {
        self.tokens.issue(parse_id(id)?, ttl_secs).await
    }

    pub async fn list_all(&self) -> ShareResult<Vec<ShareSummary>> {
        self.shares.list_all().await
    }
}

/// A malformed id names no share.
fn parse_id(id: &str) -> ShareResult<ShareId> {
    ShareId::parse(id.trim()).map_err(|_| ShareError::NotFound(id.to_string()))
}
