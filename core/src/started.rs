//! `started.json` run metadata.
//!
//! Written before the runner takes over so the job shows up as started with
//! the revision under test, following the Gubernator artifact layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File name within the artifacts directory.
pub const STARTED_FILE: &str = "started.json";

/// Contents of `started.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Started {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Refs under test (`PULL_REFS`), empty for periodic jobs.
    pub pull: String,
    /// Every repository used, keyed `owner/name`, mapped to its revision.
    pub repos: BTreeMap<String, String>,
}

impl Started {
    /// Creates the record for a single repository at `revision`.
    pub fn new(repo: impl Into<String>, revision: impl Into<String>, pull: Option<&str>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut repos = BTreeMap::new();
        repos.insert(repo.into(), revision.into());
        Self {
            timestamp,
            pull: pull.unwrap_or_default().to_string(),
            repos,
        }
    }

    /// Writes the record into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STARTED_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        tracing::debug!(path = ?path, "wrote run metadata");
        Ok(path)
    }
}
