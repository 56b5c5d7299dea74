//! Mock connector for testing.
//!
//! Provides an in-memory `Connector` that returns scripted results and records
//! every connection it hands out, so tests can run without a database server.

use super::{ColumnInfo, Connector, DatabaseClient, QueryResult, Value};
use crate::config::DatabaseTarget;
use crate::error::{CourierError, ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A scripted failure for the mock connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Opening the connection fails with the given kind.
    Connect(ErrorKind),
    /// Opening succeeds but running the query fails with the given kind.
    Execute(ErrorKind),
}

fn scripted_error(kind: ErrorKind) -> CourierError {
    match kind {
        ErrorKind::ValidationRejected => CourierError::read_only("scripted rejection"),
        ErrorKind::ConnectionFailure => CourierError::connection("scripted connection failure"),
        ErrorKind::SyntaxFailure => CourierError::syntax("scripted syntax failure"),
        ErrorKind::IntegrityFailure => CourierError::integrity("scripted integrity failure"),
        ErrorKind::UnknownFailure => CourierError::query("scripted failure"),
    }
}

/// Shared counters describing what a `MockConnector` did.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<(String, String)>>>,
}

impl ConnectionTracker {
    /// Number of connections successfully opened.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// `(target name, sql)` for every query that reached a connection.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn record(&self, target: &str, sql: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push((target.to_string(), sql.to_string()));
        }
    }
}

/// A connector that returns predefined results.
#[derive(Debug, Clone)]
pub struct MockConnector {
    default_result: QueryResult,
    results: HashMap<String, QueryResult>,
    failure: Option<MockFailure>,
    calls: ConnectionTracker,
}

impl MockConnector {
    /// Creates a connector whose queries all return a single `result` column.
    pub fn new() -> Self {
        let default_result = QueryResult::with_data(
            vec![ColumnInfo::new("result", "text")],
            vec![vec![Value::String("ok".to_string())]],
        );
        Self {
            default_result,
            results: HashMap::new(),
            failure: None,
            calls: ConnectionTracker::default(),
        }
    }

    /// Returns `result` for every query without a specific script.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.default_result = result;
        self
    }

    /// Returns `result` for exactly this SQL text.
    pub fn with_query_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.results.insert(sql.into(), result);
        self
    }

    /// Fails every connection or execution with the given failure.
    pub fn failing(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Returns a handle onto this connector's counters.
    pub fn tracker(&self) -> ConnectionTracker {
        self.calls.clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, target: &DatabaseTarget) -> Result<Box<dyn DatabaseClient>> {
        if let Some(MockFailure::Connect(kind)) = self.failure {
            return Err(scripted_error(kind));
        }
        self.calls.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockClient {
            target: target.name.clone(),
            default_result: self.default_result.clone(),
            results: self.results.clone(),
            failure: self.failure,
            calls: self.calls.clone(),
            closed: false,
        }))
    }
}

struct MockClient {
    target: String,
    default_result: QueryResult,
    results: HashMap<String, QueryResult>,
    failure: Option<MockFailure>,
    calls: ConnectionTracker,
    closed: bool,
}

#[async_trait]
impl DatabaseClient for MockClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        if self.closed {
            return Err(CourierError::connection("Connection is already closed"));
        }
        self.calls.record(&self.target, sql);

        if let Some(MockFailure::Execute(kind)) = self.failure {
            return Err(scripted_error(kind));
        }

        let result = self.results.get(sql).unwrap_or(&self.default_result);
        Ok(result.clone().with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
