//! Error types for db-courier.
//!
//! Defines the main error enum used throughout the application and the
//! driver-independent failure taxonomy reported by query execution.

use std::fmt;
use thiserror::Error;

/// Driver-independent classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The query failed the read-only guard and never reached a connection.
    ValidationRejected,
    /// Network, authentication, TLS or other operational failures.
    ConnectionFailure,
    /// The engine rejected the statement as malformed.
    SyntaxFailure,
    /// The engine reported a constraint violation.
    IntegrityFailure,
    /// Anything else.
    UnknownFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationRejected => write!(f, "ValidationRejected"),
            Self::ConnectionFailure => write!(f, "ConnectionFailure"),
            Self::SyntaxFailure => write!(f, "SyntaxFailure"),
            Self::IntegrityFailure => write!(f, "IntegrityFailure"),
            Self::UnknownFailure => write!(f, "UnknownFailure"),
        }
    }
}

/// Main error type for db-courier operations.
#[derive(Error, Debug)]
pub enum CourierError {
    /// The query is not read-only (rejected before any connection is opened).
    #[error("Read-only access: {0}")]
    ReadOnlyViolation(String),

    /// Database connection errors (host unreachable, auth failed, TLS, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed statements, unknown tables or columns.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Constraint violations surfaced by the engine.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Query execution errors that fit no other category.
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, unknown target, bad interval, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local storage errors (history database, job and target files).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Result export errors.
    #[error("Export error: {0}")]
    Export(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Creates a read-only violation with the given message.
    pub fn read_only(msg: impl Into<String>) -> Self {
        Self::ReadOnlyViolation(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a syntax error with the given message.
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    /// Creates an integrity error with the given message.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates an export error with the given message.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ReadOnlyViolation(_) => "Read-Only Access",
            Self::Connection(_) => "Connection Error",
            Self::Syntax(_) => "Query Error",
            Self::Integrity(_) => "Data Integrity Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Export(_) => "Export Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Maps the error onto the driver-independent failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadOnlyViolation(_) => ErrorKind::ValidationRejected,
            Self::Connection(_) => ErrorKind::ConnectionFailure,
            Self::Syntax(_) => ErrorKind::SyntaxFailure,
            Self::Integrity(_) => ErrorKind::IntegrityFailure,
            Self::Query(_)
            | Self::Config(_)
            | Self::Persistence(_)
            | Self::Export(_)
            | Self::Internal(_) => ErrorKind::UnknownFailure,
        }
    }
}

/// Result type alias using CourierError.
pub type Result<T> = std::result::Result<T, CourierError>;
