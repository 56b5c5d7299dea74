//! Query execution with read-only enforcement.
//!
//! Provides isolated query execution that can be tested independently
//! of the facade and the scheduler.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::DatabaseTarget;
use crate::db::{Connector, QueryResult};
use crate::error::Result;
use crate::safety::check_read_only;

/// Runs one read-only query per call over a fresh connection.
#[derive(Clone)]
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Validates, connects, runs and closes.
    ///
    /// A rejected query never opens a connection. Once a connection is open it
    /// is closed exactly once, whatever the outcome of the query.
    pub async fn execute(&self, target: &DatabaseTarget, sql: &str) -> Result<QueryResult> {
        check_read_only(sql)?;

        let start = Instant::now();
        let mut client = self.connector.connect(target).await?;

        let result = client.execute_query(sql).await;

        if let Err(e) = client.close().await {
            warn!(db = %target.name, "Failed to close connection: {e}");
        }

        let result = result?;
        let elapsed = start.elapsed();
        debug!(
            db = %target.name,
            rows = result.row_count(),
            "Query finished in {:?}",
            elapsed
        );

        Ok(result.with_execution_time(elapsed))
    }
}
