//! Periodic cleanup of dead shares and unused access grants.

use crate::metrics;
use crate::qr::QrTokenIssuer;
use crate::shares::FileShareStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome of one sweep run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub shares_deleted: u64,
    pub tokens_purged: u64,
}

pub struct CleanupSweeper {
    shares: Arc<FileShareStore>,
    tokens: Arc<QrTokenIssuer>,
    interval: Duration,
    running: Mutex<()>,
}

impl CleanupSweeper {
    pub fn new(shares: Arc<FileShareStore>, tokens: Arc<QrTokenIssuer>, interval: Duration) -> Self {
        Self {
            shares,
            tokens,
            interval,
            running: Mutex::new(()),
        }
    }

    /// Run one sweep now. Returns `None` if another run is still in
    /// progress; that run is left to finish and this one is skipped.
    pub async fn run_once(&self) -> Option<SweepReport> {
        let Ok(_guard) = self.running.try_lock() else {
            metrics::SWEEP_SKIPPED.inc();
            tracing::debug!("Sweep already running, skipping");
            return None;
        };
        metrics::SWEEP_RUNS.inc();

        let mut report = SweepReport::default();

        match self.shares.sweep_expired().await {
            Ok(deleted) => report.shares_deleted = deleted,
            Err(e) => {
                tracing::error!(error = %e, "Share sweep failed");
            }
        }

        match self.tokens.purge_expired().await {
            Ok(purged) => report.tokens_purged = purged,
            Err(e) => {
                tracing::error!(error = %e, "Access token purge failed");
            }
        }

        tracing::info!(
            shares_deleted = report.shares_deleted,
            tokens_purged = report.tokens_purged,
            "Cleanup sweep finished"
        );
        Some(report)
    }

    /// Run the sweep on a fixed interval until `shutdown` fires. The first
    /// run happens immediately. Missed ticks are skipped, not queued.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Cleanup sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
        })
    }
}
