//! Live query tests.
//!
//! Run against a real server when DATABASE_URL is set, skipped otherwise.

use std::sync::Arc;

use db_courier::config::DatabaseTarget;
use db_courier::db::{SqlxConnector, Value};
use db_courier::error::ErrorKind;
use db_courier::query::QueryExecutor;

/// Helper to build a target from the environment.
fn get_test_target() -> Option<DatabaseTarget> {
    let url = std::env::var("DATABASE_URL").ok()?;
    DatabaseTarget::from_connection_string("live", &url).ok()
}

fn executor() -> QueryExecutor {
    QueryExecutor::new(Arc::new(SqlxConnector))
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(target) = get_test_target() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor()
        .execute(&target, "SELECT 1 AS num, 'hello' AS greeting")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["num", "greeting"]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::String("hello".to_string()));
}

#[tokio::test]
async fn test_execute_select_with_null() {
    let Some(target) = get_test_target() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor()
        .execute(&target, "SELECT NULL AS nothing")
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    assert!(result.rows[0][0].is_null());
}

#[tokio::test]
async fn test_syntax_error_is_classified() {
    let Some(target) = get_test_target() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor()
        .execute(&target, "SELECT FROM WHERE")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SyntaxFailure);
}

#[tokio::test]
async fn test_mutation_rejected_before_connecting() {
    let target = DatabaseTarget::from_connection_string(
        "unreachable",
        "postgres://nobody@127.0.0.1:1/none",
    )
    .unwrap();

    let err = executor()
        .execute(&target, "DELETE FROM users")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationRejected);
}

#[tokio::test]
async fn test_unreachable_server_is_connection_failure() {
    let target = DatabaseTarget::from_connection_string(
        "unreachable",
        "mysql://nobody:pw@127.0.0.1:1/none",
    )
    .unwrap();

    let err = executor().execute(&target, "SELECT 1").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectionFailure);
}
