//! Query history persistence.
//!
//! Append-only log of interactively executed queries with filtered,
//! paginated reads.

use crate::error::{CourierError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

/// Storage format of history timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A query history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: String,
    pub database: String,
    pub query: String,
}

/// Raw database row for a history record. Columns are nullable in files
/// written by earlier releases.
#[derive(Debug, Clone, FromRow)]
struct HistoryRecordRow {
    id: i64,
    timestamp: Option<String>,
    database: Option<String>,
    query: Option<String>,
}

impl From<HistoryRecordRow> for HistoryRecord {
    fn from(row: HistoryRecordRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp.unwrap_or_default(),
            database: row.database.unwrap_or_default(),
            query: row.query.unwrap_or_default(),
        }
    }
}

/// Filter options for querying history.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    /// First day included.
    pub start_date: NaiveDate,
    /// Last day included, through 23:59:59.
    pub end_date: NaiveDate,
    /// Case-sensitive substring of the query text.
    pub search: Option<String>,
    /// Exact database name.
    pub database: Option<String>,
}

impl HistoryFilter {
    /// Creates a filter over an inclusive date range.
    pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            search: None,
            database: None,
        }
    }

    fn where_clause(&self) -> String {
        let mut clause = String::from(" WHERE timestamp BETWEEN ? AND ?");
        if self.search.is_some() {
            clause.push_str(" AND instr(query, ?) > 0");
        }
        if self.database.is_some() {
            clause.push_str(r#" AND "database" = ?"#);
        }
        clause
    }

    fn bounds(&self) -> (String, String) {
        (
            format!("{} 00:00:00", self.start_date.format("%Y-%m-%d")),
            format!("{} 23:59:59", self.end_date.format("%Y-%m-%d")),
        )
    }
}

/// One page of history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub rows: Vec<HistoryRecord>,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Records a new query execution in history.
pub async fn append(
    pool: &SqlitePool,
    timestamp: NaiveDateTime,
    database: &str,
    query: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO query_history (timestamp, "database", query)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(timestamp.format(TIMESTAMP_FORMAT).to_string())
    .bind(database)
    .bind(query)
    .execute(pool)
    .await
    .map_err(|e| CourierError::persistence(format!("Failed to record query: {e}")))?;

    Ok(result.last_insert_rowid())
}

/// Returns page `page` (zero-based) of the records matching `filter`, newest first.
pub async fn query_history(
    pool: &SqlitePool,
    filter: &HistoryFilter,
    page: u32,
    page_size: u32,
) -> Result<HistoryPage> {
    if page_size == 0 {
        return Err(CourierError::config("page size must be > 0"));
    }

    let where_clause = filter.where_clause();
    let (start, end) = filter.bounds();

    let count_sql = format!("SELECT COUNT(*) FROM query_history{where_clause}");
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(&start).bind(&end);
    if let Some(ref search) = filter.search {
        count_query = count_query.bind(search);
    }
    if let Some(ref database) = filter.database {
        count_query = count_query.bind(database);
    }
    let (total_count,) = count_query
        .fetch_one(pool)
        .await
        .map_err(|e| CourierError::persistence(format!("Failed to count history: {e}")))?;

    let list_sql = format!(
        r#"SELECT id, timestamp, "database", query FROM query_history{where_clause}
           ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?"#
    );
    let mut list_query = sqlx::query_as::<_, HistoryRecordRow>(&list_sql)
        .bind(&start)
        .bind(&end);
    if let Some(ref search) = filter.search {
        list_query = list_query.bind(search);
    }
    if let Some(ref database) = filter.database {
        list_query = list_query.bind(database);
    }
    let rows = list_query
        .bind(i64::from(page_size))
        .bind(i64::from(page) * i64::from(page_size))
        .fetch_all(pool)
        .await
        .map_err(|e| CourierError::persistence(format!("Failed to list history: {e}")))?;

    Ok(HistoryPage {
        rows: rows.into_iter().map(HistoryRecord::from).collect(),
        total_count,
        total_pages: total_pages(total_count, page_size),
    })
}

/// `ceil(total / page_size)`, zero for an empty result.
pub fn total_pages(total_count: i64, page_size: u32) -> i64 {
    let page_size = i64::from(page_size);
    (total_count + page_size - 1) / page_size
}

/// Distinct database names present in history, sorted.
pub async fn distinct_databases(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT "database" FROM query_history
        WHERE "database" IS NOT NULL
        ORDER BY "database"
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| CourierError::persistence(format!("Failed to list databases: {e}")))?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}
