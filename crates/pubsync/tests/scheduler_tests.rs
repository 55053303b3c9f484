//! Single-flight and shutdown behaviour with a real pipeline

mod common;

use async_trait::async_trait;
use common::{cycle_settings, MemoryConnector};
use pubsync::{
    client::Downstream,
    pipeline::Pipeline,
    scheduler::{parse_schedule, Scheduler},
    shutdown::ShutdownController,
    Result,
};
use pubsync_common::types::Envelope;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tempfile::TempDir;
use tokio::sync::{oneshot, Notify};

/// Downstream whose delete-all blocks until released
#[derive(Clone, Default)]
struct GatedDownstream {
    deletes: Arc<AtomicUsize>,
    inserts: Arc<AtomicUsize>,
    gate: Arc<Notify>,
}

#[async_trait]
impl Downstream for GatedDownstream {
    async fn delete_all(&self) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(())
    }

    async fn insert_all(&self, _envelopes: &[Envelope]) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_for(counter: &AtomicUsize, value: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while counter.load(Ordering::SeqCst) < value {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

fn yearly() -> cron::Schedule {
    parse_schedule("0 0 0 1 1 *").unwrap()
}

#[tokio::test]
async fn test_overlapping_triggers_cause_no_duplicate_calls() {
    let staging = TempDir::new().unwrap();
    let remote = MemoryConnector::with_file(b"1,Alpha\n", 8, 1_700_000_000);
    let downstream = GatedDownstream::default();
    let pipeline = Pipeline::new(cycle_settings(staging.path()), remote.clone(), downstream.clone());
    let scheduler = Scheduler::new(yearly(), pipeline);

    let running = scheduler.trigger().unwrap();
    wait_for(&downstream.deletes, 1).await;

    for _ in 0..5 {
        assert!(scheduler.trigger().is_none());
    }

    downstream.gate.notify_one();
    running.await.unwrap();

    assert_eq!(downstream.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(downstream.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(remote.connects(), 1);
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_cycle() {
    let staging = TempDir::new().unwrap();
    let remote = MemoryConnector::with_file(b"1,Alpha\n", 8, 1_700_000_000);
    let downstream = GatedDownstream::default();
    let pipeline = Pipeline::new(cycle_settings(staging.path()), remote.clone(), downstream.clone());
    let scheduler = Scheduler::new(yearly(), pipeline);

    scheduler.trigger().unwrap();
    wait_for(&downstream.deletes, 1).await;

    let (signal, received) = oneshot::channel::<()>();
    let controller = ShutdownController::new(scheduler.start());
    let shutdown = tokio::spawn(controller.run_until(async {
        let _ = received.await;
    }));
    signal.send(()).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());
    assert_eq!(remote.closes(), 0);

    downstream.gate.notify_one();
    shutdown.await.unwrap();

    // The cycle ran to completion and released its session
    assert_eq!(downstream.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(remote.closes(), 1);
}

#[tokio::test]
async fn test_drained_pipeline_keeps_baseline() {
    let staging = TempDir::new().unwrap();
    let remote = MemoryConnector::with_file(b"1,Alpha\n", 8, 1_700_000_000);
    let downstream = GatedDownstream::default();
    let pipeline = Pipeline::new(cycle_settings(staging.path()), remote, downstream.clone());
    let scheduler = Scheduler::new(yearly(), pipeline);

    let running = scheduler.trigger().unwrap();
    wait_for(&downstream.deletes, 1).await;
    downstream.gate.notify_one();
    running.await.unwrap();

    let handle = scheduler.start();
    handle.stop();
    let pipeline = handle.drained().await;
    let pipeline = pipeline.lock().await;
    assert_eq!(pipeline.baseline().size, 8);
    assert_eq!(pipeline.cycles(), 1);
}
