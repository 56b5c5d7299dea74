//! End-to-end tests of the `Courier` facade over the mock connector.

use super::common::{at, open, open_in, target};
use chrono::NaiveDate;
use db_courier::app::{IntervalUnit, ScheduleRequest};
use db_courier::db::{ColumnInfo, MockConnector, MockFailure, QueryResult, Value};
use db_courier::error::ErrorKind;
use db_courier::persistence::{HistoryFilter, DEFAULT_OUTPUT_PREFIX};
use db_courier::safety::Verdict;
use pretty_assertions::assert_eq;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn request(sql: &str, target_name: &str) -> ScheduleRequest {
    ScheduleRequest {
        query: sql.to_string(),
        every: 5,
        unit: IntervalUnit::Minutes,
        output_prefix: Some("daily".to_string()),
        target_name: target_name.to_string(),
    }
}

#[tokio::test]
async fn test_validate_does_not_touch_targets() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;

    assert_eq!(fx.courier.validate("select 1"), Verdict::ReadOnly);
    assert!(!fx.courier.validate("update t set a = 1").is_read_only());
}

#[tokio::test]
async fn test_execute_records_history() {
    let connector = MockConnector::new();
    let calls = connector.tracker();
    let fx = open(connector, "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let result = fx.courier.execute("Db1", "select * from orders").await.unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(calls.connects(), 1);
    assert_eq!(calls.closes(), 1);

    let filter = HistoryFilter::between(day("2024-03-15"), day("2024-03-15"));
    let page = fx.courier.history_query(&filter, 0).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.rows[0].database, "Db1");
    assert_eq!(page.rows[0].query, "select * from orders");
    assert_eq!(page.rows[0].timestamp, "2024-03-15 10:00:00");

    assert_eq!(fx.courier.distinct_databases().await.unwrap(), vec!["Db1"]);
}

#[tokio::test]
async fn test_rejected_query_never_connects_or_logs() {
    let connector = MockConnector::new();
    let calls = connector.tracker();
    let fx = open(connector, "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let err = fx
        .courier
        .execute("Db1", "select 1; drop table orders")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationRejected);
    assert_eq!(calls.connects(), 0);

    let filter = HistoryFilter::between(day("2024-03-01"), day("2024-03-31"));
    let page = fx.courier.history_query(&filter, 0).await.unwrap();
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_failed_query_is_classified_and_not_logged() {
    let connector = MockConnector::new().failing(MockFailure::Execute(ErrorKind::SyntaxFailure));
    let calls = connector.tracker();
    let fx = open(connector, "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let err = fx.courier.execute("Db1", "select frm t").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SyntaxFailure);
    assert_eq!(calls.closes(), 1);

    let filter = HistoryFilter::between(day("2024-03-15"), day("2024-03-15"));
    assert_eq!(fx.courier.history_query(&filter, 0).await.unwrap().total_count, 0);
}

#[tokio::test]
async fn test_unknown_target_rejected() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;

    let err = fx.courier.execute("nope", "select 1").await.unwrap_err();
    assert!(err.to_string().contains("Unknown database target 'nope'"));
}

#[tokio::test]
async fn test_schedule_persists_job() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let job = fx
        .courier
        .schedule(request("select count(*) from orders", "Db1"))
        .await
        .unwrap();

    assert_eq!(job.interval, 300);
    assert_eq!(job.next_run, at("2024-03-15 10:05:00"));
    assert_eq!(job.output_prefix, "daily");
    assert_eq!(fx.courier.list_jobs().await, vec![job.clone()]);

    let saved = std::fs::read_to_string(fx.dir.path().join("scheduled_queries.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(json[0]["next_run"], "2024-03-15T10:05:00");
    assert_eq!(json[0]["interval"], 300);
    assert_eq!(json[0]["target_name"], "Db1");
}

#[tokio::test]
async fn test_schedule_blank_prefix_uses_default() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let mut req = request("select 1", "Db1");
    req.output_prefix = Some("   ".to_string());
    let job = fx.courier.schedule(req).await.unwrap();

    assert_eq!(job.output_prefix, DEFAULT_OUTPUT_PREFIX);
}

#[tokio::test]
async fn test_schedule_rejections() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();

    let err = fx
        .courier
        .schedule(request("delete from orders", "Db1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationRejected);

    let mut zero = request("select 1", "Db1");
    zero.every = 0;
    assert!(fx.courier.schedule(zero).await.is_err());

    assert!(fx.courier.schedule(request("select 1", "Db9")).await.is_err());
    assert!(fx.courier.list_jobs().await.is_empty());
}

#[tokio::test]
async fn test_jobs_and_targets_survive_reopen() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    fx.courier.add_target(target("Db1")).await.unwrap();
    fx.courier.schedule(request("select 1", "Db1")).await.unwrap();
    fx.courier.close().await;

    let dir = fx.dir;
    let reopened = open_in(dir, MockConnector::new(), "2024-03-16 08:00:00").await;

    let jobs = reopened.courier.list_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].next_run, at("2024-03-15 10:05:00"));
    assert_eq!(reopened.courier.list_targets().await, vec![target("Db1")]);
}

#[tokio::test]
async fn test_export_writes_csv() {
    let fx = open(MockConnector::new(), "2024-03-15 10:00:00").await;
    let result = QueryResult::with_data(
        vec![ColumnInfo::new("a", "int"), ColumnInfo::new("b", "int")],
        vec![
            vec![Value::Int(1), Value::Int(2)],
            vec![Value::Int(3), Value::Int(4)],
        ],
    );

    let path = fx.courier.export(&result, "report.csv").unwrap();

    assert_eq!(path, fx.dir.path().join("exports").join("report.csv"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "a,b\n1,2\n3,4\n");
}
