//! Query execution for db-courier.
//!
//! This module isolates the open-run-close lifecycle of a single query from the
//! facade and the scheduler.

pub mod executor;

pub use executor::QueryExecutor;
