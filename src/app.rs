//! Core facade for db-courier.
//!
//! Wires the stores, the query executor, the result sink and the scheduler
//! together and exposes the operations front ends call.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{Config, DatabaseTarget};
use crate::db::{Connector, QueryResult, SqlxConnector};
use crate::error::{CourierError, Result};
use crate::export::ResultSink;
use crate::persistence::{
    history, HistoryFilter, HistoryPage, JobStore, ScheduledJob, StateDb, TargetStore,
    DEFAULT_OUTPUT_PREFIX,
};
use crate::query::QueryExecutor;
use crate::safety::{check_read_only, classify, Verdict};
use crate::scheduler::{first_run, Clock, JobScheduler, Notification, SystemClock};

/// Unit of a schedule interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntervalUnit {
    #[default]
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    /// Seconds in one unit.
    pub fn seconds(&self) -> u64 {
        match self {
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }
}

impl std::str::FromStr for IntervalUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minutes" | "minute" | "min" | "m" => Ok(Self::Minutes),
            "hours" | "hour" | "h" => Ok(Self::Hours),
            "days" | "day" | "d" => Ok(Self::Days),
            _ => Err(format!(
                "Invalid interval unit: {s}. Expected: minutes, hours, or days"
            )),
        }
    }
}

/// Parameters of a new scheduled job.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub query: String,
    pub every: u64,
    pub unit: IntervalUnit,
    /// Export prefix; blank means [`DEFAULT_OUTPUT_PREFIX`].
    pub output_prefix: Option<String>,
    pub target_name: String,
}

impl ScheduleRequest {
    /// Interval in seconds.
    pub fn interval_secs(&self) -> Result<u64> {
        if self.every == 0 {
            return Err(CourierError::config("Interval must be greater than zero"));
        }
        self.every
            .checked_mul(self.unit.seconds())
            .ok_or_else(|| CourierError::config("Interval is too large"))
    }
}

/// The application facade.
pub struct Courier {
    config: Config,
    history: StateDb,
    targets: Arc<RwLock<TargetStore>>,
    jobs: Arc<Mutex<JobStore>>,
    executor: QueryExecutor,
    sink: ResultSink,
    clock: Arc<dyn Clock>,
}

impl Courier {
    /// Opens all stores named by `config` and connects through sqlx.
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with(config, Arc::new(SqlxConnector), Arc::new(SystemClock)).await
    }

    /// Opens all stores with an explicit connector and clock.
    pub async fn open_with(
        config: Config,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let targets = TargetStore::load(&config.paths.targets)?;
        let default_target = targets.first().map(|t| t.name.clone());
        let jobs = JobStore::load(&config.paths.jobs, default_target.as_deref())?;
        let history = StateDb::open(&config.paths.history).await?;

        info!(
            targets = targets.list().len(),
            jobs = jobs.jobs().len(),
            "Courier ready"
        );

        Ok(Self {
            sink: ResultSink::new(config.paths.exports.clone()),
            config,
            history,
            targets: Arc::new(RwLock::new(targets)),
            jobs: Arc::new(Mutex::new(jobs)),
            executor: QueryExecutor::new(connector),
            clock,
        })
    }

    /// The configuration the facade was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classifies a query without running it.
    pub fn validate(&self, sql: &str) -> Verdict {
        classify(sql)
    }

    /// Runs a read-only query against a named target and records it in history.
    pub async fn execute(&self, target_name: &str, sql: &str) -> Result<QueryResult> {
        check_read_only(sql)?;
        let target = self.target(target_name).await?;

        let result = self.executor.execute(&target, sql).await?;

        if let Err(e) = history::append(self.history.pool(), self.clock.now(), target_name, sql).await {
            warn!(db = %target_name, "Query ran but could not be added to history: {e}");
        }

        Ok(result)
    }

    /// Adds a recurring job. The first run is one interval from now.
    pub async fn schedule(&self, request: ScheduleRequest) -> Result<ScheduledJob> {
        check_read_only(&request.query)?;
        let interval = request.interval_secs()?;
        self.target(&request.target_name).await?;

        let output_prefix = request
            .output_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_PREFIX)
            .to_string();

        let job = ScheduledJob {
            query: request.query,
            interval,
            next_run: first_run(self.clock.now(), interval),
            output_prefix,
            target_name: request.target_name,
        };

        let default_target = self.targets.read().await.first().map(|t| t.name.clone());
        {
            let mut jobs = self.jobs.lock().await;
            jobs.sync(default_target.as_deref())?;
            jobs.add(job.clone())?;
        }

        info!(
            prefix = %job.output_prefix,
            db = %job.target_name,
            interval = job.interval,
            "Query scheduled"
        );
        Ok(job)
    }

    /// Scheduled jobs in insertion order, including ones added by other
    /// processes since this facade was opened.
    pub async fn list_jobs(&self) -> Vec<ScheduledJob> {
        let default_target = self.targets.read().await.first().map(|t| t.name.clone());
        let mut jobs = self.jobs.lock().await;
        if let Err(e) = jobs.sync(default_target.as_deref()) {
            warn!("Could not re-read scheduled jobs: {e}");
        }
        jobs.jobs().to_vec()
    }

    /// One page of history, newest first. `page` is zero-based.
    pub async fn history_query(&self, filter: &HistoryFilter, page: u32) -> Result<HistoryPage> {
        history::query_history(
            self.history.pool(),
            filter,
            page,
            self.config.history.page_size,
        )
        .await
    }

    /// Database names present in history.
    pub async fn distinct_databases(&self) -> Result<Vec<String>> {
        history::distinct_databases(self.history.pool()).await
    }

    /// Writes a result as CSV under the export directory.
    pub fn export(&self, result: &QueryResult, filename: &str) -> Result<PathBuf> {
        self.sink.save_csv(result, filename)
    }

    /// Adds a database target.
    pub async fn add_target(&self, target: DatabaseTarget) -> Result<()> {
        self.targets.write().await.add(target)
    }

    /// Database targets in insertion order.
    pub async fn list_targets(&self) -> Vec<DatabaseTarget> {
        self.targets.read().await.list().to_vec()
    }

    /// Builds a scheduler sharing this facade's stores.
    pub fn scheduler(&self, notifications: mpsc::UnboundedSender<Notification>) -> JobScheduler {
        JobScheduler::new(
            self.jobs.clone(),
            self.targets.clone(),
            self.executor.clone(),
            self.sink.clone(),
            notifications,
        )
        .with_clock(self.clock.clone())
    }

    /// Closes the history database.
    pub async fn close(&self) {
        self.history.close().await;
    }

    async fn target(&self, name: &str) -> Result<DatabaseTarget> {
        let mut targets = self.targets.write().await;
        if let Err(e) = targets.reload() {
            warn!("Could not re-read database targets: {e}");
        }
        let found = targets.find(name).cloned();
        found.ok_or_else(|| CourierError::config(format!("Unknown database target '{name}'")))
    }
}
