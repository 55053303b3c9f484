//! Pubsync - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use pubsync_common::logging::{init_logging, LogSettings};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use pubsync::{
    client::HttpSyncClient,
    config::{Config, DEFAULT_CONFIG_PATH},
    pipeline::Pipeline,
    remote::SftpConnector,
    scheduler::{parse_schedule, Scheduler},
    shutdown::ShutdownController,
};

/// Sync a remote SFTP file into a downstream data service
#[derive(Debug, Parser)]
#[command(name = "pubsync", version, about)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "PUBSYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Optional .env; its values feed the config overrides below
    dotenvy::dotenv().ok();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let log_settings = LogSettings::for_level(&config.level)?.with_env_overrides()?;
    let _log_guard = init_logging(&log_settings)?;

    info!("Config data read successfully");
    debug!(
        remote = %config.remote_file(),
        staging = %config.staging_file().display(),
        cron = %config.cron,
        "Effective configuration"
    );
    warn!("SFTP host keys are accepted without verification");
    warn!("TLS certificate validation is disabled for the downstream service");

    let connector = SftpConnector::new(config.sftp_settings())?;
    let downstream = HttpSyncClient::new(&config.downstream_settings())?;
    let pipeline = Pipeline::new(config.cycle_settings(), connector, downstream);

    let schedule = parse_schedule(&config.cron)?;
    let scheduler = Scheduler::new(schedule, pipeline).start();
    let mut shutdown = ShutdownController::new(scheduler).spawn();

    let sleep = config.sleep_interval();
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Shutdown task failed")?;
                break;
            },
            _ = tokio::time::sleep(sleep) => {
                debug!("NOP sleeping");
            },
        }
    }

    info!("Pubsync stopped");
    Ok(())
}
