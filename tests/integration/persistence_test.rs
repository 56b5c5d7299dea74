//! Integration tests for the persistence layer.

use chrono::{DateTime, Duration, Local, NaiveDate};
use db_courier::persistence::{
    history, HistoryFilter, JobStore, StateDb, TargetStore, DEFAULT_OUTPUT_PREFIX,
    NO_DATABASE_AVAILABLE,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use super::common::{at, target};

async fn create_test_db() -> (StateDb, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("query_history.db");
    let db = StateDb::open(&path).await.unwrap();
    (db, dir)
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_state_db_creation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("query_history.db");

    let db = StateDb::open(&path).await.unwrap();
    assert!(path.exists());
    db.close().await;
}

#[tokio::test]
async fn test_history_pagination_across_reopen() {
    let (db, dir) = create_test_db().await;
    let start = at("2024-05-01 00:00:00");
    for i in 0..120 {
        history::append(db.pool(), start + Duration::minutes(i), "Db1", &format!("select {i}"))
            .await
            .unwrap();
    }
    db.close().await;

    let db = StateDb::open(&dir.path().join("query_history.db")).await.unwrap();
    let filter = HistoryFilter::between(day("2024-05-01"), day("2024-05-01"));

    let first = history::query_history(db.pool(), &filter, 0, 50).await.unwrap();
    assert_eq!(first.rows.len(), 50);
    assert_eq!(first.total_count, 120);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.rows[0].query, "select 119");
    assert!(first
        .rows
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));

    let last = history::query_history(db.pool(), &filter, 2, 50).await.unwrap();
    assert_eq!(last.rows.len(), 20);
    assert_eq!(last.rows[19].query, "select 0");
}

#[tokio::test]
async fn test_history_end_date_is_inclusive() {
    let (db, _dir) = create_test_db().await;
    history::append(db.pool(), at("2024-05-01 23:59:59"), "Db1", "select late")
        .await
        .unwrap();
    history::append(db.pool(), at("2024-05-02 00:00:00"), "Db1", "select next")
        .await
        .unwrap();

    let filter = HistoryFilter::between(day("2024-05-01"), day("2024-05-01"));
    let page = history::query_history(db.pool(), &filter, 0, 50).await.unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.rows[0].query, "select late");
}

#[tokio::test]
async fn test_history_search_and_database_filters() {
    let (db, _dir) = create_test_db().await;
    let ts = at("2024-05-01 12:00:00");
    history::append(db.pool(), ts, "Db1", "SELECT * FROM Users").await.unwrap();
    history::append(db.pool(), ts, "Db2", "select * from users").await.unwrap();
    history::append(db.pool(), ts, "Db2", "select * from orders").await.unwrap();

    let mut filter = HistoryFilter::between(day("2024-05-01"), day("2024-05-01"));
    filter.search = Some("users".to_string());
    let page = history::query_history(db.pool(), &filter, 0, 50).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.rows[0].database, "Db2");

    filter.search = None;
    filter.database = Some("Db2".to_string());
    let page = history::query_history(db.pool(), &filter, 0, 50).await.unwrap();
    assert_eq!(page.total_count, 2);

    assert_eq!(
        history::distinct_databases(db.pool()).await.unwrap(),
        vec!["Db1", "Db2"]
    );
}

#[test]
fn test_legacy_job_file_migrates_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scheduled_queries.json");
    std::fs::write(
        &path,
        r#"[
            {"query": "select 1", "interval": 3600, "next_run": 1700000000.0},
            {"query": "select 2", "interval": 60, "next_run": "2024-01-01T08:00:00",
             "output_file": "legacy", "database": "Old"}
        ]"#,
    )
    .unwrap();

    let store = JobStore::load(&path, Some("Db1")).unwrap();
    let jobs = store.jobs();

    let expected = DateTime::from_timestamp(1_700_000_000, 0)
        .unwrap()
        .with_timezone(&Local)
        .naive_local();
    assert_eq!(jobs[0].next_run, expected);
    assert_eq!(jobs[0].output_prefix, DEFAULT_OUTPUT_PREFIX);
    assert_eq!(jobs[0].target_name, "Db1");
    assert_eq!(jobs[1].output_prefix, "legacy");
    assert_eq!(jobs[1].target_name, "Old");

    let first_save = std::fs::read_to_string(&path).unwrap();
    assert!(!first_save.contains("1700000000"));

    let again = JobStore::load(&path, Some("Db1")).unwrap();
    assert_eq!(again.jobs(), jobs);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), first_save);
}

#[test]
fn test_job_without_target_and_no_targets_uses_sentinel() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scheduled_queries.json");
    std::fs::write(
        &path,
        r#"[{"query": "select 1", "interval": 60, "next_run": "2024-01-01T08:00:00"}]"#,
    )
    .unwrap();

    let store = JobStore::load(&path, None).unwrap();
    assert_eq!(store.jobs()[0].target_name, NO_DATABASE_AVAILABLE);
}

#[test]
fn test_target_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db_configs.json");

    let mut store = TargetStore::load(&path).unwrap();
    store.add(target("Db1")).unwrap();
    store.add(target("Db2")).unwrap();

    let reloaded = TargetStore::load(&path).unwrap();
    let names: Vec<&str> = reloaded.list().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Db1", "Db2"]);
}
