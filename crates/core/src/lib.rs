//! Core domain types and shared logic for sharebox.
//!
//! This crate defines the data model shared by every other crate:
//! - Share identifiers, lifecycle status and the liveness predicate
//! - Subscription tiers and the policy table that bounds them
//! - Client-facing request and response shapes
//! - Application configuration

pub mod clock;
pub mod config;
pub mod error;
pub mod share;
pub mod tier;

pub use error::{Error, Result};
pub use share::{
    CreateShareRequest, CreatedShare, Liveness, ShareId, ShareMetadata, ShareStatus, ShareSummary,
    UNLIMITED_DOWNLOADS,
};
pub use tier::{ExpiryRequest, Tier, TierLimits, TierPolicy};

/// Byte length of the salt prefix in a stored payload.
pub const PAYLOAD_SALT_LEN: usize = 16;

/// Byte length of the IV that follows the salt in a stored payload.
pub const PAYLOAD_IV_LEN: usize = 12;
