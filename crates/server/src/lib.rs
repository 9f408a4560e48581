//! Ephemeral encrypted-share engine.
//!
//! This crate hosts the share lifecycle on top of the storage and metadata
//! crates:
//! - Share creation, metadata, download-with-quota and delete
//! - Single-use access grants for QR hand-off
//! - The periodic cleanup sweeper
//! - Metrics and the error model a transport maps to responses

pub mod error;
pub mod metrics;
pub mod qr;
pub mod service;
pub mod shares;
pub mod state;
pub mod sweeper;

pub use error::{ErrorResponse, ShareError, ShareResult};
pub use qr::{IssuedToken, QrTokenIssuer};
pub use service::ShareService;
pub use shares::{Download, FileShareStore};
pub use state::AppState;
pub use sweeper::{CleanupSweeper, SweepReport};
