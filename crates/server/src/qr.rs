//! Short-lived single-use access grants, handed out as QR codes.
//!
//! A grant is a random secret bound to one share. Only its SHA-256 is
//! stored; redeeming it deletes the row in the same statement that checks
//! it, so a grant can be used at most once.

use crate::error::{ShareError, ShareResult};
use crate::metrics;
use base64::Engine;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sharebox_core::config::QrConfig;
use sharebox_core::{Liveness, ShareId, clock};
use sharebox_metadata::models::AccessTokenRow;
use sharebox_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;

/// A freshly issued grant. `token` is only ever seen here.
#[derive(Clone, Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub share_id: ShareId,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub struct QrTokenIssuer {
    metadata: Arc<dyn MetadataStore>,
    config: QrConfig,
}

impl QrTokenIssuer {
    pub fn new(metadata: Arc<dyn MetadataStore>, config: QrConfig) -> Self {
        Self { metadata, config }
    }

    /// Issue a grant for a live share. `ttl_secs` defaults to the configured
    /// lifetime and is clamped to the configured maximum.
    pub async fn issue(&self, share_id: ShareId, ttl_secs: Option<u64>) -> ShareResult<IssuedToken> {
        let now = clock::now();
        let share = self
            .metadata
            .get_share(*share_id.as_uuid())
            .await?
            .ok_or_else(|| ShareError::NotFound(share_id.to_string()))?;

        match share.liveness(now) {
            Liveness::Live => {}
            Liveness::Expired => {
                return Err(ShareError::Expired(share_id.to_string()));
            }
            Liveness::LimitReached => {
                return Err(ShareError::LimitReached(share_id.to_string()));
            }
        }

        let token = generate_token();
        let expires_at = now.checked_add(self.config.ttl(ttl_secs)).ok_or_else(|| {
            ShareError::Validation("access token lifetime is out of range".to_string())
        })?;
        let row = AccessTokenRow {
            token_hash: hash_token(&token),
            share_id: *share_id.as_uuid(),
            expires_at,
            created_at: now,
        };

        self.metadata
            .create_access_token(&row)
            .await
            .map_err(|e| match e {
                // Share removed between the check and the insert.
                MetadataError::NotFound(_) => ShareError::NotFound(share_id.to_string()),
                other => other.into(),
            })?;

        metrics::ACCESS_TOKENS.with_label_values(&["issued"]).inc();
        tracing::info!(share_id = %share_id, expires_at = %expires_at, "Access token issued");

        Ok(IssuedToken {
            token,
            share_id,
            expires_at,
        })
    }

    /// Redeem a grant for `share_id`. True iff the grant existed, was bound
    /// to this share and had not expired; it is gone afterwards.
    pub async fn redeem(&self, token: &str, share_id: ShareId) -> ShareResult<bool> {
        if token.is_empty() {
            metrics::ACCESS_TOKENS.with_label_values(&["rejected"]).inc();
            return Ok(false);
        }

        let redeemed = self
            .metadata
            .redeem_access_token(&hash_token(token), *share_id.as_uuid(), clock::now())
            .await?;

        let event = if redeemed { "redeemed" } else { "rejected" };
        metrics::ACCESS_TOKENS.with_label_values(&[event]).inc();
        tracing::debug!(share_id = %share_id, redeemed = redeemed, "Access token presented");
        Ok(redeemed)
    }

    /// Drop grants whose lifetime has passed without being presented.
    pub async fn purge_expired(&self) -> ShareResult<u64> {
        Ok(self
            .metadata
            .purge_expired_access_tokens(clock::now())
            .await?)
    }
}

/// Generate a random token secret using cryptographically secure RNG.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token for storage lookup.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
