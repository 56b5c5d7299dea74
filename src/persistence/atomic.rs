//! Whole-file replacement for the JSON stores.

use crate::error::{CourierError, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("store"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes `value` as pretty JSON and replaces `path` with it.
///
/// Writes and syncs a sibling temp file, then renames it over the target, so
/// a reader sees either the old contents or the new ones.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CourierError::persistence(format!("Failed to serialize {}: {e}", path.display())))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CourierError::persistence(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }

    let tmp_path = temp_path(path);
    if let Err(e) = write_synced(&tmp_path, json.as_bytes()) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(CourierError::persistence(format!(
            "Failed to write temp file {}: {e}",
            tmp_path.display()
        )));
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(CourierError::persistence(format!(
            "Failed to replace {}: {e}",
            path.display()
        )));
    }

    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
