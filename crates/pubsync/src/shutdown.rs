//! Graceful shutdown on SIGINT / SIGTERM
//!
//! On a termination signal the controller stops the scheduler, waits for any
//! in-flight cycle to finish (which closes its remote session), and then
//! reports completion. In-flight network calls are not cancelled.

use std::future::Future;
use tokio::{signal, task::JoinHandle};
use tracing::{error, info, warn};

use crate::scheduler::{Cycle, SchedulerHandle};

/// Resolves when the process receives Ctrl+C or SIGTERM
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

/// Owns the scheduler handle until shutdown
pub struct ShutdownController<J> {
    scheduler: SchedulerHandle<J>,
}

impl<J: Cycle> ShutdownController<J> {
    pub fn new(scheduler: SchedulerHandle<J>) -> Self {
        Self { scheduler }
    }

    /// Wait for `signal`, then stop the scheduler and drain the running cycle
    pub async fn run_until<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;

        warn!("Cleanup resources");
        self.scheduler.stop();
        self.scheduler.drained().await;
        info!("Terminating");
    }

    /// Listen for OS termination signals on a dedicated task.
    ///
    /// The returned handle completes once the drain is finished.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run_until(termination_signal()))
    }
}
