use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let LoadedConfig {
        config,
        path,
        found,
    } = load_config(cli.config.as_ref()).await?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level, cli.debug)?;

    debug!(
        "Starting formflow v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_DATE")
    );
    if found {
        info!("Loaded configuration from: {}", path.display());
    } else {
        debug!("Config file not found, using defaults: {}", path.display());
    }

    let cli_context = CliContext::new(config, path);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            debug!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
