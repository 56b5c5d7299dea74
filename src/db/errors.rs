//! Classification of driver errors into the crate's error taxonomy.

use crate::config::DatabaseTarget;
use crate::error::{CourierError, ErrorKind};

/// Maps a SQLSTATE code onto a failure kind by its two-character class.
pub fn classify_sqlstate(code: &str) -> ErrorKind {
    match code.get(..2) {
        Some("23") => ErrorKind::IntegrityFailure,
        Some("42") => ErrorKind::SyntaxFailure,
        // connection exception, invalid authorization, insufficient resources,
        // operator intervention
        Some("08") | Some("28") | Some("53") | Some("57") => ErrorKind::ConnectionFailure,
        _ => ErrorKind::UnknownFailure,
    }
}

fn error_for_kind(kind: ErrorKind, message: String) -> CourierError {
    match kind {
        ErrorKind::ValidationRejected => CourierError::read_only(message),
        ErrorKind::ConnectionFailure => CourierError::connection(message),
        ErrorKind::SyntaxFailure => CourierError::syntax(message),
        ErrorKind::IntegrityFailure => CourierError::integrity(message),
        ErrorKind::UnknownFailure => CourierError::query(message),
    }
}

/// Maps an error raised while running a query.
pub fn map_query_error(error: sqlx::Error) -> CourierError {
    match &error {
        sqlx::Error::Database(db_error) => {
            let kind = match db_error.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => ErrorKind::IntegrityFailure,
                _ => db_error
                    .code()
                    .map(|code| classify_sqlstate(&code))
                    .unwrap_or(ErrorKind::UnknownFailure),
            };
            error_for_kind(kind, format_database_error(&**db_error))
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => CourierError::connection(error.to_string()),
        _ => CourierError::query(error.to_string()),
    }
}

/// Formats a database error with the engine's extra detail when available.
fn format_database_error(db_error: &dyn sqlx::error::DatabaseError) -> String {
    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(my_error) = db_error.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
        result.push_str(&format!(" (errno {})", my_error.number()));
    }

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}

/// Returns true if a connect error is worth retrying.
pub(crate) fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps an error raised while opening a connection. Always a connection failure.
pub fn map_connection_error(error: sqlx::Error, target: &DatabaseTarget) -> CourierError {
    let host = target.effective_host();
    let port = target.effective_port();
    let user = if target.user.is_empty() {
        "unknown"
    } else {
        &target.user
    };
    let database = if target.database.is_empty() {
        "unknown"
    } else {
        &target.database
    };

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        CourierError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied")
        || error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        CourierError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database")
        || (error_str.contains("does not exist") && error_str.contains("database"))
    {
        CourierError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") || error_str.contains("certificate") {
        CourierError::connection(format!(
            "TLS handshake with {host}:{port} failed: {error}"
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        CourierError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        CourierError::connection(format!(
            "Unable to connect to {host}:{port}. Check your network connection and \
             database settings: {error}"
        ))
    }
}
