//! db-courier - read-only SQL runner with scheduled CSV exports.
//!
//! The [`app::Courier`] facade ties together the read-only guard, the query
//! executor, the history and job stores, the CSV sink and the job scheduler.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod output;
pub mod persistence;
pub mod query;
pub mod safety;
pub mod scheduler;
