//! Prometheus metrics for the share engine.
//!
//! Metrics carry no share ids or filenames, only aggregate counts.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static SHARES_CREATED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharebox_shares_created_total",
            "Total number of shares created",
        ),
        &["tier"],
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS_SERVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharebox_downloads_served_total",
        "Total number of downloads that returned bytes",
    )
    .expect("metric creation failed")
});

pub static SHARES_REMOVED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharebox_shares_removed_total",
            "Total number of shares removed, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static SWEEP_RUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("sharebox_sweep_runs_total", "Total number of sweep runs")
        .expect("metric creation failed")
});

pub static SWEEP_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharebox_sweep_skipped_total",
        "Sweep runs skipped because another run was still active",
    )
    .expect("metric creation failed")
});

pub static SWEEP_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharebox_sweep_failures_total",
        "Individual shares a sweep failed to remove",
    )
    .expect("metric creation failed")
});

pub static INTEGRITY_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sharebox_integrity_faults_total",
        "Live share records found without a blob",
    )
    .expect("metric creation failed")
});

pub static ACCESS_TOKENS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sharebox_access_tokens_total",
            "Access token events (issued, redeemed, rejected)",
        ),
        &["event"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests and embedders may call it freely.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(SHARES_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOADS_SERVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SHARES_REMOVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_SKIPPED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INTEGRITY_FAULTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACCESS_TOKENS.clone()))
            .expect("metric registration failed");
    });
}

/// Render all registered metrics in the Prometheus text format.
pub fn encode() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
