//! Schema versioning and migrations for the history database.
//!
//! Manages database schema evolution with forward-only migrations. Version 1
//! matches the layout of history files written by earlier releases, so an
//! existing file is adopted as-is.

use crate::error::{CourierError, Result};
use sqlx::sqlite::SqlitePool;
use tracing::info;

const CURRENT_VERSION: i32 = 2;

/// Runs all pending migrations on the database.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    ensure_schema_versions_table(pool).await?;

    let current = get_current_version(pool).await?;

    if current > CURRENT_VERSION {
        return Err(CourierError::persistence(format!(
            "History schema version ({}) is newer than supported version ({}). \
             Please upgrade db-courier to the latest version.",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        info!(
            "Migrating history database from version {} to {}",
            current, CURRENT_VERSION
        );
        run_pending_migrations(pool, current).await?;
    }

    Ok(())
}

/// Ensures the schema_versions table exists.
async fn ensure_schema_versions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        CourierError::persistence(format!("Failed to create schema_versions table: {e}"))
    })?;

    Ok(())
}

/// Gets the current schema version.
async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT MAX(version) FROM schema_versions")
        .fetch_optional(pool)
        .await
        .map_err(|e| CourierError::persistence(format!("Failed to get schema version: {e}")))?;

    Ok(row.and_then(|(v,)| v).unwrap_or(0))
}

/// Runs migrations from the current version to the target version.
async fn run_pending_migrations(pool: &SqlitePool, from_version: i32) -> Result<()> {
    for version in (from_version + 1)..=CURRENT_VERSION {
        run_migration(pool, version).await?;
        record_version(pool, version).await?;
        info!("Applied migration v{}", version);
    }
    Ok(())
}

/// Records a completed migration version.
async fn record_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_versions (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await
        .map_err(|e| CourierError::persistence(format!("Failed to record migration: {e}")))?;
    Ok(())
}

/// Runs a specific migration version.
async fn run_migration(pool: &SqlitePool, version: i32) -> Result<()> {
    match version {
        1 => migration_v1(pool).await,
        2 => migration_v2(pool).await,
        _ => Err(CourierError::persistence(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: the query history table.
async fn migration_v1(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT,
            "database" TEXT,
            query TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CourierError::persistence(format!("Failed to create query_history table: {e}")))?;

    Ok(())
}

/// Migration v2: index for the date-range scan and its ordering.
async fn migration_v2(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_query_history_timestamp
            ON query_history(timestamp DESC, id DESC)
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CourierError::persistence(format!("Failed to create timestamp index: {e}")))?;

    Ok(())
}
