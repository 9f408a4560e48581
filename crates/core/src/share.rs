//! Share identity, lifecycle status and client-facing shapes.

use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Sentinel reported as `remaining_downloads` when a share has no quota.
pub const UNLIMITED_DOWNLOADS: i64 = -1;

/// Unique identifier for a share.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(Uuid);

impl ShareId {
    /// Generate a new random share ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidShareId(format!("{s}: {e}")))
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ShareId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ShareId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareId({})", self.0)
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted lifecycle status of a share.
///
/// `Expired` and `LimitReached` are bookkeeping only: a share in either
/// state is removed by the next consume attempt or sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareStatus {
    Active,
    Expired,
    LimitReached,
}

impl ShareStatus {
    /// Parse the persisted form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "limit_reached" => Ok(Self::LimitReached),
            _ => Err(crate::Error::UnknownStatus(s.to_string())),
        }
    }

    /// Persisted form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::LimitReached => "limit_reached",
        }
    }
}

/// Outcome of evaluating a share against the clock and its quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Expired,
    LimitReached,
}

impl Liveness {
    /// The single liveness predicate.
    ///
    /// A share is expired once `now >= expires_at`, and quota-exhausted once
    /// a non-null `max_downloads` is met. Expiry is checked first. Because
    /// the counter never decreases and the clock only advances, a share
    /// that is not live never becomes live again.
    pub fn evaluate(
        expires_at: OffsetDateTime,
        max_downloads: Option<i64>,
        download_count: i64,
        now: OffsetDateTime,
    ) -> Self {
        if now >= expires_at {
            return Self::Expired;
        }
        match max_downloads {
            Some(max) if download_count >= max => Self::LimitReached,
            _ => Self::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Status this outcome should be recorded as.
    pub fn status(&self) -> ShareStatus {
        match self {
            Self::Live => ShareStatus::Active,
            Self::Expired => ShareStatus::Expired,
            Self::LimitReached => ShareStatus::LimitReached,
        }
    }

    /// Downloads left, or [`UNLIMITED_DOWNLOADS`] when the share has no
    /// quota and has not expired.
    pub fn remaining_downloads(&self, max_downloads: Option<i64>, download_count: i64) -> i64 {
        match (self, max_downloads) {
            (Self::Expired, _) => 0,
            (_, None) => UNLIMITED_DOWNLOADS,
            (_, Some(max)) => (max - download_count).max(0),
        }
    }
}

/// Upload parameters accompanying a payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateShareRequest {
    pub original_filename: String,
    /// Declared payload size. When present it must match the payload.
    #[serde(default)]
    pub size: Option<u64>,
    pub tier: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub expires_in_hours: Option<i64>,
    #[serde(default)]
    pub max_downloads: Option<i64>,
    pub salt: String,
    pub iv: String,
    #[serde(default)]
    pub owner_tag: Option<String>,
}

/// Summary returned to the uploader. Carries no download counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedShare {
    pub share_id: ShareId,
    pub tier: Tier,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// `None` means unlimited.
    pub max_downloads: Option<u32>,
    pub size: u64,
}

/// Metadata a recipient needs before downloading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMetadata {
    pub share_id: ShareId,
    pub original_filename: String,
    pub size: u64,
    pub tier: Tier,
    pub status: ShareStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub max_downloads: Option<i64>,
    /// [`UNLIMITED_DOWNLOADS`] when there is no quota.
    pub remaining_downloads: i64,
    pub salt: String,
    pub iv: String,
}

/// Operator-facing listing entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSummary {
    pub share_id: ShareId,
    pub original_filename: String,
    pub size: u64,
    pub tier: Tier,
    pub status: ShareStatus,
    pub owner_tag: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub max_downloads: Option<i64>,
    pub downloads_used: i64,
}
