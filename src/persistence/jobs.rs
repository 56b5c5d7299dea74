//! Scheduled job persistence.
//!
//! Jobs live in a JSON file as an ordered list. Records written by earlier
//! releases are lenient (numeric `next_run`, missing or differently named
//! keys) and are normalized once on load, then written back.
//!
//! Other processes may add jobs to the same file, so a long-lived store merges
//! the file back in with [`JobStore::sync`] before it writes.

use crate::error::{CourierError, Result};
use crate::persistence::atomic;
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Output prefix used when a record has none.
pub const DEFAULT_OUTPUT_PREFIX: &str = "default_output";

/// Target name used when a record has none and no target is configured.
pub const NO_DATABASE_AVAILABLE: &str = "No database available";

const NEXT_RUN_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A recurring query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    /// SQL text, validated read-only when scheduled.
    pub query: String,
    /// Seconds between runs, always > 0.
    pub interval: u64,
    /// Local time of the next run.
    #[serde(serialize_with = "serialize_next_run")]
    pub next_run: NaiveDateTime,
    /// Export filename prefix.
    pub output_prefix: String,
    /// Name of the target the query runs against.
    pub target_name: String,
}

impl ScheduledJob {
    /// Returns true if the job should run at `now`.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_run
    }

    /// True if both describe the same recurring query, ignoring `next_run`.
    fn same_job(&self, other: &ScheduledJob) -> bool {
        self.query == other.query
            && self.interval == other.interval
            && self.output_prefix == other.output_prefix
            && self.target_name == other.target_name
    }

    /// Moves `next_run` one interval past `now`.
    pub fn advance(&mut self, now: NaiveDateTime) {
        self.next_run = now
            .checked_add_signed(interval_duration(self.interval))
            .unwrap_or(NaiveDateTime::MAX);
    }
}

pub(crate) fn interval_duration(interval: u64) -> chrono::Duration {
    i64::try_from(interval)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Formats like `YYYY-MM-DDTHH:MM:SS`, with `.ffffff` only when there are
/// sub-second digits.
pub fn format_next_run(next_run: &NaiveDateTime) -> String {
    if next_run.nanosecond() == 0 {
        next_run.format(NEXT_RUN_FORMAT).to_string()
    } else {
        next_run.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

fn serialize_next_run<S: Serializer>(
    next_run: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_next_run(next_run))
}

fn parse_next_run(text: &str) -> Result<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| CourierError::config(format!("Invalid next_run timestamp '{text}'")))
}

/// `next_run` as found on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StoredNextRun {
    /// Seconds since the Unix epoch.
    Epoch(f64),
    Text(String),
}

impl StoredNextRun {
    fn into_local(self) -> Result<NaiveDateTime> {
        match self {
            Self::Text(text) => parse_next_run(&text),
            Self::Epoch(secs) => {
                let micros = (secs * 1_000_000.0).round();
                if !micros.is_finite() {
                    return Err(CourierError::config(format!("Invalid next_run epoch {secs}")));
                }
                DateTime::from_timestamp_micros(micros as i64)
                    .map(|utc| utc.with_timezone(&Local).naive_local())
                    .ok_or_else(|| CourierError::config(format!("Invalid next_run epoch {secs}")))
            }
        }
    }
}

/// A job record as found on disk, before normalization.
#[derive(Debug, Clone, Deserialize)]
struct JobRecord {
    query: String,
    interval: i64,
    next_run: StoredNextRun,
    #[serde(default, alias = "output_file")]
    output_prefix: Option<String>,
    #[serde(default, alias = "database")]
    target_name: Option<String>,
}

/// Turns raw records into typed jobs.
///
/// Missing targets fall back to `default_target`, or to
/// [`NO_DATABASE_AVAILABLE`] when there is none.
fn migrate(records: Vec<JobRecord>, default_target: Option<&str>) -> Result<Vec<ScheduledJob>> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let interval = u64::try_from(record.interval)
                .ok()
                .filter(|interval| *interval > 0)
                .ok_or_else(|| {
                    CourierError::config(format!(
                        "Scheduled job #{} has interval {}; it must be > 0",
                        index + 1,
                        record.interval
                    ))
                })?;

            Ok(ScheduledJob {
                query: record.query,
                interval,
                next_run: record.next_run.into_local()?,
                output_prefix: record
                    .output_prefix
                    .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string()),
                target_name: record.target_name.unwrap_or_else(|| {
                    default_target.unwrap_or(NO_DATABASE_AVAILABLE).to_string()
                }),
            })
        })
        .collect()
}

/// Durable, ordered collection of scheduled jobs.
#[derive(Debug)]
pub struct JobStore {
    path: PathBuf,
    jobs: Vec<ScheduledJob>,
}

/// Reads and normalizes the jobs file. `None` if there is no file.
fn read_jobs(path: &Path, default_target: Option<&str>) -> Result<Option<Vec<ScheduledJob>>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        CourierError::persistence(format!("Failed to read {}: {e}", path.display()))
    })?;
    let records: Vec<JobRecord> = serde_json::from_str(&content).map_err(|e| {
        CourierError::config(format!("Invalid jobs file {}: {e}", path.display()))
    })?;

    migrate(records, default_target).map(Some)
}

impl JobStore {
    /// Loads and normalizes the jobs file, then writes the normalized form back.
    ///
    /// A missing file is an empty collection and is not created. If the write
    /// back fails the normalized jobs are still returned; the next save retries.
    pub fn load(path: &Path, default_target: Option<&str>) -> Result<Self> {
        let Some(jobs) = read_jobs(path, default_target)? else {
            debug!("No jobs file at {}", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                jobs: Vec::new(),
            });
        };

        let store = Self {
            path: path.to_path_buf(),
            jobs,
        };
        if let Err(e) = store.save() {
            warn!("Could not write normalized jobs file, will retry on next save: {e}");
        }

        info!("Loaded {} scheduled job(s) from {}", store.jobs.len(), path.display());
        Ok(store)
    }

    /// Merges the jobs file into the collection held in memory.
    ///
    /// The file decides which jobs exist and their order, so jobs added by
    /// another process are picked up. A job present in both keeps the later
    /// `next_run`. On error the collection is left unchanged.
    pub fn sync(&mut self, default_target: Option<&str>) -> Result<()> {
        let on_disk = read_jobs(&self.path, default_target)?.unwrap_or_default();
        let mut held = std::mem::take(&mut self.jobs);

        self.jobs = on_disk
            .into_iter()
            .map(|mut job| {
                if let Some(pos) = held.iter().position(|h| h.same_job(&job)) {
                    let mine = held.remove(pos);
                    job.next_run = job.next_run.max(mine.next_run);
                }
                job
            })
            .collect();

        if !held.is_empty() {
            debug!("{} job(s) no longer in {}", held.len(), self.path.display());
        }
        Ok(())
    }

    /// Writes the whole collection.
    pub fn save(&self) -> Result<()> {
        atomic::write_json(&self.path, &self.jobs)
    }

    /// Appends a job and persists. The job is not kept if persisting fails.
    pub fn add(&mut self, job: ScheduledJob) -> Result<()> {
        self.jobs.push(job);
        if let Err(e) = self.save() {
            self.jobs.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Jobs in insertion order.
    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub(crate) fn jobs_mut(&mut self) -> &mut [ScheduledJob] {
        &mut self.jobs
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
