//! Stat rules engine server
//!
//! Main entry point: loads the configuration and rules, then evaluates them
//! against Home Assistant until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use ha_config::ServerConfig;
use ha_server::assemble;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drive Home Assistant entities from stat rules
#[derive(Debug, Parser)]
#[command(name = "ha-rules", version, about)]
struct Cli {
    /// Directory holding configuration.yaml, secrets.yaml and the rules file
    #[arg(long, env = "HA_RULES_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    info!("Starting stat rules engine");

    let config = ServerConfig::load(&cli.config_dir).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config_dir.display()
        )
    })?;

    let (manager, report) = assemble(&config).await?;
    for skipped in &report.skipped {
        info!(entry = %skipped.key, reason = %skipped.reason, "Skipped rules entry");
    }

    let handle = manager
        .start()
        .context("evaluation loop already running")?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    manager.stop();
    handle.await.context("evaluation loop task failed")?;

    Ok(())
}
