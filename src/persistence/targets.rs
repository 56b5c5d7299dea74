//! Database target persistence.
//!
//! Targets are kept in a JSON file as an ordered list and rewritten as a whole
//! whenever one is added.

use crate::config::DatabaseTarget;
use crate::error::{CourierError, Result};
use crate::persistence::atomic;
use std::path::{Path, PathBuf};
use tracing::info;

/// Durable, ordered list of database targets with unique names.
#[derive(Debug)]
pub struct TargetStore {
    path: PathBuf,
    targets: Vec<DatabaseTarget>,
}

impl TargetStore {
    /// Loads the targets file. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            targets: read_targets(path)?,
        })
    }

    /// Re-reads the file so targets added by another process become visible.
    /// On error the current list is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.targets = read_targets(&self.path)?;
        Ok(())
    }

    /// Appends a target and rewrites the file. Names must be unique.
    ///
    /// The file is re-read first so concurrent additions are not overwritten.
    pub fn add(&mut self, target: DatabaseTarget) -> Result<()> {
        self.reload()?;
        if target.name.trim().is_empty() {
            return Err(CourierError::config("Target name must not be empty"));
        }
        if self.find(&target.name).is_some() {
            return Err(CourierError::config(format!(
                "A target named '{}' already exists",
                target.name
            )));
        }

        let shown = target.display_string();
        self.targets.push(target);
        if let Err(e) = atomic::write_json(&self.path, &self.targets) {
            self.targets.pop();
            return Err(e);
        }

        info!("Added target {shown}");
        Ok(())
    }

    /// Targets in insertion order.
    pub fn list(&self) -> &[DatabaseTarget] {
        &self.targets
    }

    /// Looks a target up by name.
    pub fn find(&self, name: &str) -> Option<&DatabaseTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// The first configured target, used as the fallback for scheduled jobs.
    pub fn first(&self) -> Option<&DatabaseTarget> {
        self.targets.first()
    }
}

fn read_targets(path: &Path) -> Result<Vec<DatabaseTarget>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        CourierError::persistence(format!("Failed to read {}: {e}", path.display()))
    })?;
    let targets: Vec<DatabaseTarget> = serde_json::from_str(&content).map_err(|e| {
        CourierError::config(format!("Invalid targets file {}: {e}", path.display()))
    })?;
    check_unique(&targets)?;
    Ok(targets)
}

fn check_unique(targets: &[DatabaseTarget]) -> Result<()> {
    for (i, target) in targets.iter().enumerate() {
        if targets[..i].iter().any(|t| t.name == target.name) {
            return Err(CourierError::config(format!(
                "Duplicate target name '{}'",
                target.name
            )));
        }
    }
    Ok(())
}
