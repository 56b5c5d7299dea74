//! Persistence layer for db-courier.
//!
//! Owns the durable state: the SQLite query history, the JSON list of database
//! targets and the JSON list of scheduled jobs.

mod atomic;
pub mod history;
pub mod jobs;
mod migrations;
pub mod targets;

pub use history::{HistoryFilter, HistoryPage, HistoryRecord};
pub use jobs::{JobStore, ScheduledJob, DEFAULT_OUTPUT_PREFIX, NO_DATABASE_AVAILABLE};
pub use targets::TargetStore;

use crate::error::{CourierError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// Handle on the query history database.
pub struct StateDb {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl StateDb {
    /// Opens or creates the history database at the specified path.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::ensure_parent_dirs(path)?;

        match Self::try_open(path).await {
            Ok(db) => Ok(db),
            Err(e) => {
                warn!("Failed to open history database: {e}. Attempting recovery...");
                Self::attempt_recovery(path).await
            }
        }
    }

    /// Opens an in-memory database. History is lost when the handle is dropped.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CourierError::persistence(format!("Invalid database path: {e}")))?;
        let pool = Self::pool_with(options).await?;
        migrations::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Attempts to open the database with retries for lock contention.
    async fn try_open(path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * 2u64.pow(attempt)))
                    .await;
            }

            match Self::connect(path).await {
                Ok(pool) => {
                    migrations::run_migrations(&pool).await?;
                    info!("History database opened at {}", path.display());
                    return Ok(Self {
                        pool,
                        db_path: path.to_path_buf(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CourierError::persistence("Failed to open database after retries")))
    }

    /// Creates a single-connection pool to the SQLite database.
    async fn connect(path: &Path) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        Self::pool_with(options).await
    }

    async fn pool_with(options: SqliteConnectOptions) -> Result<SqlitePool> {
        // One connection serializes writers.
        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                CourierError::persistence(format!("Failed to connect to history database: {e}"))
            })
    }

    /// Ensures parent directories exist for the database path.
    fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CourierError::persistence(format!(
                    "Failed to create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Attempts to recover from a corrupted database by backing up and recreating.
    async fn attempt_recovery(path: &Path) -> Result<Self> {
        let backup_path = path.with_extension("db.bak");

        if path.exists() {
            std::fs::rename(path, &backup_path).map_err(|e| {
                CourierError::persistence(format!(
                    "Failed to backup corrupted database to {}: {e}",
                    backup_path.display()
                ))
            })?;
            warn!("Backed up corrupted database to {}", backup_path.display());
        }

        Self::try_open(path).await.map_err(|e| {
            CourierError::persistence(format!("Failed to recreate database after backup: {e}"))
        })
    }

    /// Returns the path to the history database.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
