//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::DatabaseTarget;
use crate::db::{
    is_transient_error, map_connection_error, map_query_error, ColumnInfo, DatabaseClient,
    QueryResult, Row, Value,
};
use crate::error::{CourierError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of connection attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    conn: Option<PgConnection>,
}

impl PostgresClient {
    /// Opens a connection to the target.
    pub async fn connect(target: &DatabaseTarget) -> Result<Self> {
        let options = connect_options(target)?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            match PgConnection::connect_with(&options).await {
                Ok(conn) => {
                    debug!("Successfully connected to database");
                    return Ok(Self { conn: Some(conn) });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2; // Exponential backoff
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, target),
            None => CourierError::connection("no connection attempt was made"),
        })
    }

    /// Describes the result columns of a statement without running it again.
    async fn fetch_column_metadata(conn: &mut PgConnection, sql: &str) -> Vec<ColumnInfo> {
        match conn.prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            Err(e) => {
                debug!("Could not describe empty result set: {e}");
                Vec::new()
            }
        }
    }
}

fn connect_options(target: &DatabaseTarget) -> Result<PgConnectOptions> {
    let ca = target.tls_ca()?;

    let mut options = PgConnectOptions::new()
        .host(target.effective_host())
        .port(target.effective_port())
        .username(&target.user)
        .password(&target.password);

    if !target.database.is_empty() {
        options = options.database(&target.database);
    }

    options = match ca {
        Some(ca) if target.requires_ssl => options.ssl_mode(PgSslMode::VerifyCa).ssl_root_cert(ca),
        Some(ca) => options.ssl_mode(PgSslMode::Prefer).ssl_root_cert(ca),
        None => options,
    };

    Ok(options)
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| CourierError::connection("Connection is already closed"))?;

        let start = Instant::now();

        let result: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(map_query_error)?;

        let execution_time = start.elapsed();

        // Extract column metadata - from first row if available, otherwise from the statement
        let columns: Vec<ColumnInfo> = if let Some(first_row) = result.first() {
            first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        } else {
            Self::fetch_column_metadata(conn, sql).await
        };

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| CourierError::connection(format!("Failed to close connection: {e}")))?;
        }
        Ok(())
    }
}

/// Converts a PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}
