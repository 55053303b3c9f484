//! Cron-driven cycle scheduler
//!
//! The scheduler owns the cycle job behind a mutex. Each tick makes a single
//! non-blocking attempt to take the lock:
//! - lock free: the cycle runs on its own task holding the lock
//! - lock held: the previous cycle is still running, the tick is dropped
//!
//! Dropped ticks are never queued. Stopping prevents new ticks but never
//! interrupts a running cycle; [`SchedulerHandle::drained`] waits for it.

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use pubsync_common::{Result, SyncError};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A unit of scheduled work
#[async_trait]
pub trait Cycle: Send + 'static {
    async fn run(&mut self);
}

/// Parse a cron expression.
///
/// Accepts standard five-field expressions (minute resolution) as well as
/// six or seven fields with leading seconds and optional trailing year.
/// Numeric days of the week use the standard numbering (0 or 7 = Sunday,
/// 1 = Monday ... 6 = Saturday).
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let mut fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
    if fields.len() == 5 {
        fields.insert(0, "0".to_string());
    }
    if fields.len() >= 6 {
        fields[5] = day_of_week_field(&fields[5]);
    }

    Schedule::from_str(&fields.join(" ")).map_err(|e| SyncError::Schedule {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Rewrite numeric days from 0-7 (Sunday first, 7 also Sunday) into the
/// cron crate's 1-7 (1 = Sunday). Names, `*` and `?` pass through.
fn day_of_week_field(field: &str) -> String {
    field
        .split(',')
        .map(day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn day_of_week_item(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };

    if let Some((start, end)) = base.split_once('-') {
        let step = step.map_or(Some(1), |s| s.parse::<usize>().ok().filter(|s| *s > 0));
        return match (start.parse::<u8>(), end.parse::<u8>(), step) {
            (Ok(start), Ok(end), Some(step)) if start <= end && end <= 7 => {
                // Expanded so ranges ending on 7 keep Sunday
                let mut days: Vec<u8> = (start..=end).step_by(step).map(shift_day).collect();
                days.sort_unstable();
                days.dedup();
                days.iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            },
            _ => item.to_string(),
        };
    }

    let shifted = match base.parse::<u8>() {
        Ok(day) if day <= 7 => shift_day(day).to_string(),
        _ => base.to_string(),
    };
    match step {
        Some(step) => format!("{}/{}", shifted, step),
        None => shifted,
    }
}

fn shift_day(day: u8) -> u8 {
    day % 7 + 1
}

/// Fires a [`Cycle`] on a cron schedule with single-flight execution
pub struct Scheduler<J> {
    schedule: Schedule,
    slot: Arc<Mutex<J>>,
    stop: CancellationToken,
}

impl<J: Cycle> Scheduler<J> {
    pub fn new(schedule: Schedule, job: J) -> Self {
        Self {
            schedule,
            slot: Arc::new(Mutex::new(job)),
            stop: CancellationToken::new(),
        }
    }

    /// Fire one cycle now unless one is already running.
    ///
    /// Returns the cycle task, or `None` when the trigger was dropped.
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        match self.slot.clone().try_lock_owned() {
            Ok(mut job) => Some(tokio::spawn(async move {
                job.run().await;
            })),
            Err(_) => {
                warn!("Previous sync cycle still running, skipping this trigger");
                None
            },
        }
    }

    /// Start firing on schedule in a background task
    pub fn start(self) -> SchedulerHandle<J> {
        let stop = self.stop.clone();
        let slot = self.slot.clone();
        let task = tokio::spawn(self.run());
        info!("Scheduler started");

        SchedulerHandle { stop, slot, task }
    }

    async fn run(self) {
        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                warn!("Schedule has no upcoming fire times, scheduler exiting");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!("Next sync cycle at {}", next);

            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(wait) => {},
            }

            if self.stop.is_cancelled() {
                break;
            }
            self.trigger();
        }
        info!("Scheduler stopped");
    }
}

/// Control handle for a running [`Scheduler`]
pub struct SchedulerHandle<J> {
    stop: CancellationToken,
    slot: Arc<Mutex<J>>,
    task: JoinHandle<()>,
}

impl<J: Cycle> SchedulerHandle<J> {
    /// Stop admitting new cycles. A running cycle is left alone.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Wait for the scheduler loop to exit and any in-flight cycle to finish.
    ///
    /// Returns the job so callers can inspect its final state.
    pub async fn drained(self) -> Arc<Mutex<J>> {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
        drop(self.slot.lock().await);
        self.slot
    }
}
