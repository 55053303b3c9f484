//! Pubsync Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Keeps a downstream data service in step with a single file published on an
//! SFTP server.
//!
//! # Overview
//!
//! On every cron tick the service:
//!
//! - **Detects**: stats the remote file and compares size and mtime with the
//!   fingerprint of the last successful sync
//! - **Fetches**: streams the file into a local staging path
//! - **Transforms**: parses `id,payload` lines and wraps each record in an
//!   envelope stamped with a nanosecond timestamp
//! - **Replaces**: `DELETE`s every downstream record, then `POST`s the new set
//!
//! The baseline only advances after both downstream calls succeed, so any
//! failure is retried in full on the next tick.
//!
//! # Architecture
//!
//! - [`scheduler`]: cron ticks with single-flight execution
//! - [`pipeline`]: one cycle, from connect to baseline update
//! - [`remote`]: SFTP access behind the [`remote::RemoteConnector`] seam
//! - [`client`]: the downstream replace protocol behind [`client::Downstream`]
//! - [`shutdown`]: signal handling and drain
//!
//! # Example
//!
//! ```no_run
//! use pubsync::{
//!     client::HttpSyncClient, config::Config, pipeline::Pipeline, remote::SftpConnector,
//!     scheduler::{parse_schedule, Scheduler},
//!     shutdown::ShutdownController,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.json")?;
//!     let pipeline = Pipeline::new(
//!         config.cycle_settings(),
//!         SftpConnector::new(config.sftp_settings())?,
//!         HttpSyncClient::new(&config.downstream_settings())?,
//!     );
//!     let handle = Scheduler::new(parse_schedule(&config.cron)?, pipeline).start();
//!     ShutdownController::new(handle).spawn().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod detector;
pub mod fetch;
pub mod pipeline;
pub mod remote;
pub mod scheduler;
pub mod shutdown;
pub mod transform;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{CycleOutcome, Pipeline};
pub use pubsync_common::{Result, Severity, SyncError};
