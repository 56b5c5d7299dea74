//! Fixed-interval job scheduler.
//!
//! On every tick the scheduler reads the clock once, runs each due job through
//! the query executor, exports successful results and moves the job's
//! `next_run` one interval past the tick time. The whole job collection is
//! written back at the end of every tick. Targets and jobs are re-read from
//! disk first, since other processes add to the same files.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DatabaseTarget;
use crate::export::{scheduled_filename, ResultSink};
use crate::persistence::{JobStore, ScheduledJob, TargetStore};
use crate::query::QueryExecutor;

/// An outcome reported to whichever front end is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Warning(String),
    Error(String),
}

impl Notification {
    /// The message text.
    pub fn message(&self) -> &str {
        match self {
            Self::Success(msg) | Self::Warning(msg) | Self::Error(msg) => msg,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(msg) => write!(f, "[ok] {msg}"),
            Self::Warning(msg) => write!(f, "[warn] {msg}"),
            Self::Error(msg) => write!(f, "[error] {msg}"),
        }
    }
}

/// Counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Jobs that were due and attempted.
    pub executed: usize,
    /// Attempts that produced an export.
    pub succeeded: usize,
}

/// Runs scheduled jobs on a fixed tick.
pub struct JobScheduler {
    jobs: Arc<Mutex<JobStore>>,
    targets: Arc<RwLock<TargetStore>>,
    executor: QueryExecutor,
    sink: ResultSink,
    clock: Arc<dyn Clock>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl JobScheduler {
    /// Creates a scheduler reading the system clock.
    pub fn new(
        jobs: Arc<Mutex<JobStore>>,
        targets: Arc<RwLock<TargetStore>>,
        executor: QueryExecutor,
        sink: ResultSink,
        notifications: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self {
            jobs,
            targets,
            executor,
            sink,
            clock: Arc::new(SystemClock),
            notifications,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs every due job once.
    ///
    /// The job store stays locked for the whole tick, so schedule additions
    /// wait until the tick has written its results.
    pub async fn tick(&self) -> TickSummary {
        let mut store = self.jobs.lock().await;
        let default_target = self.refresh_targets().await;
        if let Err(e) = store.sync(default_target.as_deref()) {
            warn!("Could not re-read scheduled jobs, using the ones in memory: {e}");
        }

        let now = self.clock.now();
        let mut summary = TickSummary::default();

        for job in store.jobs_mut().iter_mut() {
            if !job.is_due(now) {
                continue;
            }

            summary.executed += 1;
            if self.run_job(job).await {
                summary.succeeded += 1;
            }
            job.advance(now);
        }

        // Jobs scheduled elsewhere while this tick ran.
        if let Err(e) = store.sync(default_target.as_deref()) {
            warn!("Could not re-read scheduled jobs before saving: {e}");
        }
        if let Err(e) = store.save() {
            warn!("Failed to persist scheduled jobs, will retry next tick: {e}");
        }

        if summary.executed > 0 {
            info!(
                executed = summary.executed,
                succeeded = summary.succeeded,
                "Scheduler tick complete"
            );
        } else {
            debug!("Scheduler tick: nothing due");
        }
        summary
    }

    /// Runs one job. Returns true if its result was exported.
    async fn run_job(&self, job: &ScheduledJob) -> bool {
        let Some(target) = self.resolve_target(&job.target_name).await else {
            self.notify(Notification::Error(
                "Error executing scheduled query: no database targets are configured".to_string(),
            ));
            return false;
        };

        let result = match self.executor.execute(&target, &job.query).await {
            Ok(result) => result,
            Err(e) => {
                warn!(prefix = %job.output_prefix, db = %target.name, "Scheduled query failed: {e}");
                self.notify(Notification::Error(format!(
                    "Error executing scheduled query: {e}"
                )));
                return false;
            }
        };

        let filename = scheduled_filename(&job.output_prefix, self.clock.now());
        match self.sink.save_csv(&result, &filename) {
            Ok(path) => {
                info!(
                    prefix = %job.output_prefix,
                    db = %target.name,
                    rows = result.row_count(),
                    "Scheduled query exported"
                );
                self.notify(Notification::Success(format!(
                    "Scheduled query executed and saved as {}",
                    path.display()
                )));
                true
            }
            Err(e) => {
                warn!(prefix = %job.output_prefix, "Export failed: {e}");
                self.notify(Notification::Error(format!(
                    "Error executing scheduled query: {e}"
                )));
                false
            }
        }
    }

    /// Re-reads the targets file and returns the first target's name.
    async fn refresh_targets(&self) -> Option<String> {
        let mut targets = self.targets.write().await;
        if let Err(e) = targets.reload() {
            warn!("Could not re-read database targets, using the ones in memory: {e}");
        }
        targets.first().map(|t| t.name.clone())
    }

    /// Looks the target up by name, falling back to the first configured one.
    async fn resolve_target(&self, name: &str) -> Option<DatabaseTarget> {
        let targets = self.targets.read().await;
        if let Some(target) = targets.find(name) {
            return Some(target.clone());
        }

        let fallback = targets.first()?.clone();
        self.notify(Notification::Warning(format!(
            "Database '{name}' not found. Using default."
        )));
        Some(fallback)
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            debug!("No listener for scheduler notifications");
        }
    }

    /// Ticks every `period` until `cancel` fires.
    ///
    /// The first tick happens one period after start. A tick in progress when
    /// cancellation arrives runs to completion.
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        info!("Scheduler started, ticking every {:?}", period);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Runs the loop on its own task.
    pub fn spawn(self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(period, cancel))
    }
}

/// Returns the `next_run` a newly scheduled job gets.
pub fn first_run(now: NaiveDateTime, interval: u64) -> NaiveDateTime {
    now.checked_add_signed(crate::persistence::jobs::interval_duration(interval))
        .unwrap_or(NaiveDateTime::MAX)
}
