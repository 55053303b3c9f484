//! The sync cycle
//!
//! One cycle runs strictly in sequence:
//! 1. Connect to the remote endpoint
//! 2. Stat the watched file and compare against the baseline
//! 3. If changed: download, parse, delete-all, insert-all
//! 4. Advance the baseline, only when both downstream calls succeeded
//!
//! The remote session is closed at the end of every cycle whatever the
//! outcome. Any failure leaves the baseline untouched so the next tick
//! retries the whole cycle.

use async_trait::async_trait;
use pubsync_common::{types::SyncBaseline, Result, Severity, SyncError};
use std::path::PathBuf;
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    client::Downstream,
    detector::ChangeDetector,
    fetch::fetch,
    remote::{RemoteConnector, RemoteSession},
    scheduler::Cycle,
    transform,
};

/// Per-cycle paths and tags, derived from the service config
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Remote file to watch (`source-path` + `filename`)
    pub remote_path: String,
    /// Local staging file (`destination-path` + `filename`)
    pub staging_path: PathBuf,
    /// Tag stamped on every envelope
    pub meta_info: String,
}

/// What a cycle did
#[derive(Debug)]
pub enum CycleOutcome {
    /// Remote fingerprint matches the baseline; nothing fetched or sent
    Unchanged,
    /// Remote file does not exist; nothing fetched or sent
    Missing,
    /// Downstream replaced and baseline advanced
    Synced {
        records: usize,
        malformed: usize,
        bytes: u64,
    },
    /// Cycle aborted; baseline untouched
    Failed(SyncError),
}

impl CycleOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Pipeline state: collaborators plus the baseline.
///
/// The scheduler owns the pipeline behind a lock, so at most one cycle ever
/// touches the baseline at a time.
pub struct Pipeline<C, D> {
    settings: CycleSettings,
    connector: C,
    downstream: D,
    detector: ChangeDetector,
    cycles: u64,
}

impl<C, D> Pipeline<C, D>
where
    C: RemoteConnector,
    D: Downstream,
{
    pub fn new(settings: CycleSettings, connector: C, downstream: D) -> Self {
        Self {
            settings,
            connector,
            downstream,
            detector: ChangeDetector::new(),
            cycles: 0,
        }
    }

    /// Fingerprint of the last successful sync
    pub fn baseline(&self) -> SyncBaseline {
        self.detector.baseline()
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle and log its outcome. Never panics on cycle errors.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        let span = info_span!("cycle", seq = self.cycles);

        async {
            let outcome = match self.execute().await {
                Ok(outcome) => outcome,
                Err(e) => CycleOutcome::Failed(e),
            };
            report(&outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&mut self) -> Result<CycleOutcome> {
        let mut session = self.connector.connect().await?;
        let result = self.sync_with(session.as_mut()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close remote session gracefully: {}", e);
        }
        result
    }

    async fn sync_with(&mut self, session: &mut dyn RemoteSession) -> Result<CycleOutcome> {
        let remote_path = self.settings.remote_path.as_str();

        info!("Getting file meta data for {}", remote_path);
        let current = match session.stat(remote_path).await {
            Ok(fingerprint) => fingerprint,
            Err(SyncError::NotFound(path)) => {
                warn!("File stat error: {} not found", path);
                return Ok(CycleOutcome::Missing);
            },
            Err(e) => return Err(e),
        };

        if !self.detector.has_changed(&current) {
            info!("File stats unchanged - no processing required");
            return Ok(CycleOutcome::Unchanged);
        }
        info!(
            size = current.size,
            modified_at = %current.modified_at,
            "Remote file changed"
        );

        let staging = self.settings.staging_path.as_path();
        let mut reader = session.open(remote_path).await?;
        let bytes = fetch(&mut reader, staging).await?;
        drop(reader);
        info!("Copied file to local dir ({} bytes)", bytes);

        let parsed = transform::parse(staging).await?;
        let records = parsed.records.len();
        let envelopes = transform::wrap(parsed.records, &self.settings.meta_info);

        self.downstream.delete_all().await?;
        info!("Deleted all downstream records");

        self.downstream.insert_all(&envelopes).await?;
        info!("Inserted {} downstream records", records);

        self.detector.advance(current);

        Ok(CycleOutcome::Synced {
            records,
            malformed: parsed.malformed,
            bytes,
        })
    }
}

fn report(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Unchanged | CycleOutcome::Missing => {},
        CycleOutcome::Synced {
            records,
            malformed,
            bytes,
        } => {
            info!(records, malformed, bytes, "Sync cycle complete");
        },
        CycleOutcome::Failed(e) => match e.severity() {
            Severity::Warning => warn!("Sync cycle skipped: {}", e),
            Severity::Error => error!("Sync cycle failed: {}", e),
            Severity::Critical => error!(
                alert = true,
                "Sync cycle failed after delete-all succeeded, downstream is empty until the next successful cycle: {}",
                e
            ),
        },
    }
}

#[async_trait]
impl<C, D> Cycle for Pipeline<C, D>
where
    C: RemoteConnector + 'static,
    D: Downstream + 'static,
{
    async fn run(&mut self) {
        self.run_cycle().await;
    }
}
