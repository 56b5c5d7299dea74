//! Database abstraction layer for db-courier.
//!
//! Provides a trait-based interface for single-use database connections,
//! allowing different backends (and test doubles) to be used interchangeably.

mod errors;
mod mock;
mod mysql;
mod postgres;
mod types;

pub use errors::{classify_sqlstate, map_connection_error, map_query_error};
pub(crate) use errors::is_transient_error;
pub use mock::{ConnectionTracker, MockConnector, MockFailure};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::DatabaseTarget;
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
}

impl DatabaseBackend {
    /// Returns the backend as a string for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }
}

/// One open connection to a database target.
///
/// A client is used for a single execution and must be closed afterwards.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Executes a SQL query and returns the complete result set.
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections to database targets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection to the given target.
    async fn connect(&self, target: &DatabaseTarget) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector backed by real sqlx connections, one per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, target: &DatabaseTarget) -> Result<Box<dyn DatabaseClient>> {
        match target.backend {
            DatabaseBackend::MySql => {
                let client = MySqlClient::connect(target).await?;
                Ok(Box::new(client))
            }
            DatabaseBackend::Postgres => {
                let client = PostgresClient::connect(target).await?;
                Ok(Box::new(client))
            }
        }
    }
}
