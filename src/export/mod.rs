//! CSV export of query results.

use crate::db::QueryResult;
use crate::error::{CourierError, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes query results as CSV files under an export directory.
#[derive(Debug, Clone)]
pub struct ResultSink {
    output_dir: PathBuf,
}

impl ResultSink {
    /// Creates a sink rooted at `output_dir`. The directory is created on first write.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory relative filenames resolve against.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `result` to `filename` and returns the path written.
    ///
    /// Header row of column names, then one line per row in result order.
    /// NULL is an empty field and every line ends with `\n`.
    pub fn save_csv(&self, result: &QueryResult, filename: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.output_dir.join(filename.as_ref());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CourierError::export(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(&path)
            .map_err(|e| CourierError::export(format!("Failed to create {}: {e}", path.display())))?;

        writer
            .write_record(result.column_names())
            .map_err(|e| CourierError::export(format!("Failed to write header: {e}")))?;

        for row in &result.rows {
            writer
                .write_record(row.iter().map(|value| value.to_field_string()))
                .map_err(|e| CourierError::export(format!("Failed to write row: {e}")))?;
        }

        writer
            .flush()
            .map_err(|e| CourierError::export(format!("Failed to flush {}: {e}", path.display())))?;

        info!(rows = result.row_count(), "Exported results to {}", path.display());
        Ok(path)
    }
}

/// Filename for a scheduled export: `{prefix}_{YYYYMMDDHHMMSS}.csv`.
pub fn scheduled_filename(prefix: &str, now: NaiveDateTime) -> String {
    format!("{}_{}.csv", prefix, now.format("%Y%m%d%H%M%S"))
}
