//! Shared fixtures.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use db_courier::app::Courier;
use db_courier::config::{Config, DatabaseTarget};
use db_courier::db::MockConnector;
use db_courier::scheduler::ManualClock;
use tempfile::TempDir;

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn target(name: &str) -> DatabaseTarget {
    DatabaseTarget {
        name: name.to_string(),
        host: "db.internal".to_string(),
        user: "report".to_string(),
        password: "secret".to_string(),
        database: "shop".to_string(),
        ..Default::default()
    }
}

/// Config whose every path lives under `dir`.
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.paths.targets = dir.join("db_configs.json");
    config.paths.jobs = dir.join("scheduled_queries.json");
    config.paths.history = dir.join("query_history.db");
    config.paths.exports = dir.join("exports");
    config
}

/// Opens a courier on the stores under `dir`, as a separate process would.
pub async fn courier_in(dir: &Path, connector: MockConnector, clock: Arc<ManualClock>) -> Courier {
    Courier::open_with(config_in(dir), Arc::new(connector), clock)
        .await
        .unwrap()
}

pub struct Fixture {
    pub dir: TempDir,
    pub courier: Courier,
    pub clock: Arc<ManualClock>,
}

/// Opens a courier over `connector` with a manual clock at `start`.
pub async fn open(connector: MockConnector, start: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    open_in(dir, connector, start).await
}

pub async fn open_in(dir: TempDir, connector: MockConnector, start: &str) -> Fixture {
    let clock = Arc::new(ManualClock::new(at(start)));
    let courier = courier_in(dir.path(), connector, clock.clone()).await;
    Fixture {
        dir,
        courier,
        clock,
    }
}
