//! Scheduler tests driven through the facade with a manual clock.

use std::sync::Arc;
use std::time::Duration;

use super::common::{at, courier_in, open, target};
use db_courier::app::{IntervalUnit, ScheduleRequest};
use db_courier::db::{ColumnInfo, MockConnector, MockFailure, QueryResult, Value};
use db_courier::error::ErrorKind;
use db_courier::persistence::JobStore;
use db_courier::scheduler::{ManualClock, Notification};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn every_minute(sql: &str, target_name: &str, prefix: &str) -> ScheduleRequest {
    ScheduleRequest {
        query: sql.to_string(),
        every: 1,
        unit: IntervalUnit::Minutes,
        output_prefix: Some(prefix.to_string()),
        target_name: target_name.to_string(),
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

#[tokio::test]
async fn test_due_job_exports_and_reschedules_from_detection() {
    let result = QueryResult::with_data(
        vec![ColumnInfo::new("total", "bigint")],
        vec![vec![Value::Int(42)]],
    );
    let fx = open(MockConnector::new().with_result(result), "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();
    fx.courier
        .schedule(every_minute("select count(*) from orders", "Db1", "orders"))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = fx.courier.scheduler(tx);

    // Not yet due.
    fx.clock.set(at("2024-03-15 10:00:30"));
    assert_eq!(scheduler.tick().await.executed, 0);

    // Five seconds late: runs once, next run measured from now.
    fx.clock.set(at("2024-03-15 10:01:05"));
    let summary = scheduler.tick().await;
    assert_eq!(summary.executed, 1);
    assert_eq!(summary.succeeded, 1);

    let jobs = fx.courier.list_jobs().await;
    assert_eq!(jobs[0].next_run, at("2024-03-15 10:02:05"));

    let export = fx.dir.path().join("exports").join("orders_20240315100105.csv");
    assert_eq!(std::fs::read_to_string(&export).unwrap(), "total\n42\n");

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert!(matches!(&notes[0], Notification::Success(msg)
        if msg.starts_with("Scheduled query executed and saved as")));

    let saved = std::fs::read_to_string(fx.dir.path().join("scheduled_queries.json")).unwrap();
    assert!(saved.contains("2024-03-15T10:02:05"));
}

#[tokio::test]
async fn test_long_overdue_job_runs_once() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();
    fx.courier
        .schedule(every_minute("select 1", "Db1", "r"))
        .await
        .unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let scheduler = fx.courier.scheduler(tx);

    fx.clock.set(at("2024-03-15 13:00:00"));
    assert_eq!(scheduler.tick().await.executed, 1);
    assert_eq!(scheduler.tick().await.executed, 0);
    assert_eq!(
        fx.courier.list_jobs().await[0].next_run,
        at("2024-03-15 13:01:00")
    );
}

#[tokio::test]
async fn test_failure_notifies_and_still_reschedules() {
    let connector = MockConnector::new().failing(MockFailure::Connect(ErrorKind::ConnectionFailure));
    let fx = open(connector, "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();
    fx.courier
        .schedule(every_minute("select 1", "Db1", "r"))
        .await
        .unwrap();
    fx.courier
        .schedule(every_minute("select 2", "Db1", "s"))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = fx.courier.scheduler(tx);

    fx.clock.set(at("2024-03-15 10:01:00"));
    let summary = scheduler.tick().await;
    assert_eq!(summary.executed, 2);
    assert_eq!(summary.succeeded, 0);

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| matches!(n, Notification::Error(msg)
        if msg.starts_with("Error executing scheduled query:"))));

    for job in fx.courier.list_jobs().await {
        assert_eq!(job.next_run, at("2024-03-15 10:02:00"));
    }
}

#[tokio::test]
async fn test_missing_target_falls_back_to_first() {
    let connector = MockConnector::new();
    let calls = connector.tracker();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("scheduled_queries.json"),
        r#"[{"query": "select 1", "interval": 60, "next_run": "2024-03-15T10:00:00",
             "output_prefix": "r", "target_name": "Retired"}]"#,
    )
    .unwrap();
    let fx = super::common::open_in(dir, connector, "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let summary = fx.courier.scheduler(tx).tick().await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(calls.executed(), vec![("Db1".to_string(), "select 1".to_string())]);

    let notes = drain(&mut rx);
    assert_eq!(
        notes[0],
        Notification::Warning("Database 'Retired' not found. Using default.".to_string())
    );
    assert!(matches!(notes[1], Notification::Success(_)));
}

#[tokio::test]
async fn test_run_loop_stops_on_cancel() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let handle = fx
        .courier
        .scheduler(tx)
        .spawn(Duration::from_millis(10), cancel.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_running_scheduler_keeps_jobs_scheduled_by_another_courier() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(at("2024-03-15 10:00:00")));
    let connector = MockConnector::new();
    let calls = connector.tracker();

    let runner = courier_in(dir.path(), connector.clone(), clock.clone()).await;
    runner.add_target(target("Db1")).await.unwrap();
    runner
        .schedule(every_minute("select 1", "Db1", "first"))
        .await
        .unwrap();

    let other = courier_in(dir.path(), connector, clock.clone()).await;
    other.add_target(target("Db2")).await.unwrap();
    other
        .schedule(every_minute("select 2", "Db2", "second"))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    clock.set(at("2024-03-15 10:01:00"));
    let summary = runner.scheduler(tx).tick().await;

    assert_eq!(summary.executed, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(
        calls.executed(),
        vec![
            ("Db1".to_string(), "select 1".to_string()),
            ("Db2".to_string(), "select 2".to_string()),
        ]
    );
    assert!(drain(&mut rx)
        .iter()
        .all(|n| matches!(n, Notification::Success(_))));

    let on_disk = JobStore::load(&dir.path().join("scheduled_queries.json"), None).unwrap();
    let prefixes: Vec<&str> = on_disk
        .jobs()
        .iter()
        .map(|j| j.output_prefix.as_str())
        .collect();
    assert_eq!(prefixes, vec!["first", "second"]);
    assert!(on_disk
        .jobs()
        .iter()
        .all(|j| j.next_run == at("2024-03-15 10:02:00")));
    assert_eq!(other.list_jobs().await.len(), 2);
}
