//! # Pubsub Node
//!
//! Usage: `pubsub-node [config.toml]` (or `PUBSUB_CONFIG=config.toml`).
//! Log level comes from `RUST_LOG`, default `info`.

use anyhow::{Context, Result};
use pubsub_node::{load_config, NodeRuntime};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config().context("failed to load configuration")?;

    let runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Pubsub node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
