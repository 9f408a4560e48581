//! Subscription tiers and the policy table that bounds each share.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};

/// Subscription class of a share.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    /// Parse a tier name. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(Self::Free),
            "PRO" => Ok(Self::Pro),
            _ => Err(Error::UnknownTier(s.to_string())),
        }
    }

    /// Canonical (upper-case) name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
        }
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest expiry horizon any tier may be configured with (100 years).
pub const MAX_EXPIRATION_HOURS_LIMIT: u32 = 876_600;

/// Limits applied to shares of one tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Largest accepted payload, in bytes.
    pub max_file_size: u64,
    /// Longest lifetime a share may be given, in hours.
    pub max_expiration_hours: u32,
    /// When set, every share of this tier must use exactly this download
    /// quota. When unset, any non-negative quota is accepted and 0 means
    /// unlimited.
    #[serde(default)]
    pub fixed_downloads: Option<u32>,
}

impl TierLimits {
    /// Longest lifetime as a duration.
    pub fn max_lifetime(&self) -> Duration {
        Duration::hours(i64::from(self.max_expiration_hours))
    }

    fn validate(&self, tier: Tier) -> std::result::Result<(), String> {
        if self.max_file_size == 0 {
            return Err(format!("tiers.{tier}: max_file_size must be greater than 0"));
        }
        if self.max_expiration_hours == 0 {
            return Err(format!(
                "tiers.{tier}: max_expiration_hours must be greater than 0"
            ));
        }
        if self.max_expiration_hours > MAX_EXPIRATION_HOURS_LIMIT {
            return Err(format!(
                "tiers.{tier}: max_expiration_hours must be at most {MAX_EXPIRATION_HOURS_LIMIT}"
            ));
        }
        if self.fixed_downloads == Some(0) {
            return Err(format!(
                "tiers.{tier}: fixed_downloads must be positive when set"
            ));
        }
        Ok(())
    }
}

/// How the caller asked for a share's expiry to be chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryRequest {
    /// An absolute instant.
    At(OffsetDateTime),
    /// A number of hours from creation.
    InHours(i64),
    /// The tier's longest allowed lifetime.
    TierMaximum,
}

/// Static table mapping each tier to its limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    #[serde(default = "default_free_limits")]
    pub free: TierLimits,
    #[serde(default = "default_pro_limits")]
    pub pro: TierLimits,
}

fn default_free_limits() -> TierLimits {
    TierLimits {
        max_file_size: 100 * 1024 * 1024,
        max_expiration_hours: 24,
        fixed_downloads: Some(1),
    }
}

fn default_pro_limits() -> TierLimits {
    TierLimits {
        max_file_size: 5 * 1024 * 1024 * 1024,
        max_expiration_hours: 720,
        fixed_downloads: None,
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            free: default_free_limits(),
            pro: default_pro_limits(),
        }
    }
}

impl TierPolicy {
    /// Limits for a tier.
    pub fn limits(&self, tier: Tier) -> &TierLimits {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
        }
    }

    /// Validate the table.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.free.validate(Tier::Free)?;
        self.pro.validate(Tier::Pro)
    }

    /// Reject payloads larger than the tier allows.
    pub fn check_size(&self, tier: Tier, size: u64) -> Result<()> {
        let max = self.limits(tier).max_file_size;
        if size > max {
            return Err(Error::PolicyViolation(format!(
                "file size {size} exceeds the {tier} limit of {max} bytes"
            )));
        }
        Ok(())
    }

    /// Compute the expiry instant for a share created at `now`.
    ///
    /// `now` is expected to already be truncated to whole seconds; the
    /// returned instant is as well.
    pub fn resolve_expiry(
        &self,
        tier: Tier,
        now: OffsetDateTime,
        request: ExpiryRequest,
    ) -> Result<OffsetDateTime> {
        let limits = self.limits(tier);
        let ceiling = later(now, limits.max_lifetime())?;

        let expires_at = match request {
            ExpiryRequest::At(at) => {
                let at = crate::clock::truncate(at);
                if at <= now {
                    return Err(Error::PolicyViolation(
                        "expires_at must be in the future".to_string(),
                    ));
                }
                at
            }
            ExpiryRequest::InHours(hours) => {
                if hours <= 0 {
                    return Err(Error::PolicyViolation(
                        "expires_in_hours must be greater than 0".to_string(),
                    ));
                }
                if hours > i64::from(limits.max_expiration_hours) {
                    return Err(Error::PolicyViolation(format!(
                        "expiration of {hours}h exceeds the {tier} limit of {}h",
                        limits.max_expiration_hours
                    )));
                }
                later(now, Duration::hours(hours))?
            }
            ExpiryRequest::TierMaximum => ceiling,
        };

        if expires_at > ceiling {
            return Err(Error::PolicyViolation(format!(
                "expiration exceeds the {tier} limit of {}h",
                limits.max_expiration_hours
            )));
        }
        Ok(expires_at)
    }

    /// Resolve the requested download quota into the stored value.
    ///
    /// `None` in the result means unlimited.
    pub fn resolve_max_downloads(&self, tier: Tier, requested: Option<i64>) -> Result<Option<u32>> {
        if let Some(n) = requested
            && n < 0
        {
            return Err(Error::PolicyViolation(
                "max_downloads must be >= 0".to_string(),
            ));
        }

        match self.limits(tier).fixed_downloads {
            Some(fixed) => match requested {
                None => Ok(Some(fixed)),
                Some(n) if n == i64::from(fixed) => Ok(Some(fixed)),
                Some(_) => Err(Error::PolicyViolation(format!(
                    "{tier} tier requires max_downloads = {fixed}"
                ))),
            },
            None => match requested {
                None | Some(0) => Ok(None),
                Some(n) => u32::try_from(n).map(Some).map_err(|_| {
                    Error::PolicyViolation(format!("max_downloads {n} is too large"))
                }),
            },
        }
    }
}

fn later(now: OffsetDateTime, lifetime: Duration) -> Result<OffsetDateTime> {
    now.checked_add(lifetime).ok_or_else(|| {
        Error::PolicyViolation(format!("expiration of {lifetime} is out of range"))
    })
}
