//! Sharebox daemon.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sharebox_core::config::AppConfig;
use sharebox_server::AppState;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sharebox - ephemeral encrypted file sharing
#[derive(Parser, Debug)]
#[command(name = "shareboxd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SHAREBOX_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    /// Run a single cleanup sweep and exit
    #[arg(long)]
    sweep_once: bool,
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path,
            "No config file found, using defaults and environment"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SHAREBOX_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sharebox v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    sharebox_server::metrics::register_metrics();

    let storage = sharebox_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    let metadata = sharebox_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata health check failed")?;
    tracing::info!("Metadata store ready");

    let state = AppState::new(config, storage, metadata);

    if args.sweep_once {
        if let Some(report) = state.sweeper.run_once().await {
            tracing::info!(
                shares_deleted = report.shares_deleted,
                tokens_purged = report.tokens_purged,
                "One-off sweep complete"
            );
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let sweeper_handle = if state.config.sweep.enabled {
        tracing::info!(
            interval_secs = state.config.sweep.interval_secs,
            batch_size = state.config.sweep.batch_size,
            "Cleanup sweeper enabled"
        );
        Some(state.sweeper.clone().spawn(shutdown.clone()))
    } else {
        tracing::warn!("Cleanup sweeper disabled; dead shares are only removed on access");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    shutdown.cancel();
    if let Some(handle) = sweeper_handle
        && let Err(e) = handle.await
    {
        tracing::error!(error = %e, "Cleanup sweeper task failed");
    }

    tracing::info!("Sharebox stopped");
    Ok(())
}
