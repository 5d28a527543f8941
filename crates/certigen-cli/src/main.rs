#![doc = include_str!("../README.md")]

mod cli;

use clap::Parser;
use cli::commands::dispatch;
use cli::config::{AppConfig, CliArgs};
use cli::telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    dispatch(&config)
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Running with full config: {:#?}", config);
    } else {
        tracing::debug!(
            "Using database {} with {} workers",
            config.database.display(),
            config.pipeline.workers
        );
    }
}
