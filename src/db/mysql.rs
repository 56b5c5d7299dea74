//! MySQL / MariaDB client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient` trait
//! over a single sqlx connection.

use crate::config::DatabaseTarget;
use crate::db::{
    is_transient_error, map_connection_error, map_query_error, ColumnInfo, DatabaseClient,
    QueryResult, Row, Value,
};
use crate::error::{CourierError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of connection attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// MySQL database client holding one open connection.
#[derive(Debug)]
pub struct MySqlClient {
    conn: Option<MySqlConnection>,
}

impl MySqlClient {
    /// Opens a connection to the target.
    ///
    /// TLS settings are checked before anything touches the network.
    pub async fn connect(target: &DatabaseTarget) -> Result<Self> {
        let options = connect_options(target)?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!(db = %target.name, "MySQL connection attempt {attempt} of {MAX_RETRY_ATTEMPTS}");

            match MySqlConnection::connect_with(&options).await {
                Ok(conn) => return Ok(Self { conn: Some(conn) }),
                Err(e) => {
                    let retry = attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e);
                    last_error = Some(e);
                    if !retry {
                        break;
                    }
                    warn!("Connection attempt {attempt} failed (transient error), retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, target),
            None => CourierError::connection("no connection attempt was made"),
        })
    }

    async fn fetch_column_metadata(conn: &mut MySqlConnection, sql: &str) -> Vec<ColumnInfo> {
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

/// Runs `sql` over the text protocol: SHOW and DESCRIBE are not all
/// preparable on MySQL.
async fn fetch_text(conn: &mut MySqlConnection, sql: &str) -> sqlx::Result<Vec<MySqlRow>> {
    conn.fetch_all(sqlx::raw_sql(sql)).await
}

fn connect_options(target: &DatabaseTarget) -> Result<MySqlConnectOptions> {
    let ca = target.tls_ca()?;

    let mut options = MySqlConnectOptions::new()
        .host(target.effective_host())
        .port(target.effective_port())
        .username(&target.user)
        .password(&target.password);

    if !target.database.is_empty() {
        options = options.database(&target.database);
    }

    options = match ca {
        Some(ca) if target.requires_ssl => options.ssl_mode(MySqlSslMode::VerifyCa).ssl_ca(ca),
        Some(ca) => options.ssl_mode(MySqlSslMode::Preferred).ssl_ca(ca),
        None => options,
    };

    Ok(options)
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| CourierError::connection("Connection is already closed"))?;

        let start = Instant::now();

        let result = fetch_text(conn, sql).await.map_err(map_query_error)?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => first_row
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect(),
            None => Self::fetch_column_metadata(conn, sql).await,
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

/// Converts a MySQL row to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql>,
{
    row.try_get_unchecked::<Option<T>, _>(index).ok().flatten()
}

/// Converts a single column value. Values arrive in text form, so anything
/// without a dedicated mapping (decimals, temporal types, JSON) is kept as text.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let typed = match type_name {
        "BOOLEAN" => decode::<i64>(row, index).map(|v| Value::Bool(v != 0)),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            decode::<i64>(row, index).map(Value::Int)
        }

        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => decode::<u64>(row, index).map(Value::from),

        "FLOAT" | "DOUBLE" => decode::<f64>(row, index).map(Value::Float),

        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => decode::<Vec<u8>>(row, index).map(Value::Bytes),

        _ => None,
    };

    typed
        .or_else(|| decode::<String>(row, index).map(Value::String))
        .unwrap_or(Value::Null)
}
