//! Disk persistence of the fused schedule.
//!
//! The last good schedule is written after each successful refresh and read
//! back at start-up, so a restart can serve data before the first fetch
//! completes. Files are keyed by config hash: a schedule built under another
//! configuration is never loaded.

use std::path::{Path, PathBuf};

use crate::domain::ScheduleStore;

/// Errors from writing a schedule to disk.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize schedule: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Directory of persisted schedules.
#[derive(Debug, Clone)]
pub struct ScheduleArchive {
    dir: PathBuf,
}

impl ScheduleArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the schedule for `config_hash`.
    ///
    /// Characters outside `[A-Za-z0-9_-]` are replaced so the hash can't
    /// escape the directory.
    pub fn path_for(&self, config_hash: &str) -> PathBuf {
        let safe: String = config_hash
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("schedule-{safe}.json"))
    }

    /// Load the schedule persisted for `config_hash`.
    ///
    /// Returns `None` if there is none, it can't be read, or it was written
    /// under a different config hash.
    pub fn load(&self, config_hash: &str) -> Option<ScheduleStore> {
        let contents = std::fs::read_to_string(self.path_for(config_hash)).ok()?;
        let store: ScheduleStore = serde_json::from_str(&contents).ok()?;
        (store.config_hash() == config_hash).then_some(store)
    }

    /// Persist a schedule under its own config hash.
    ///
    /// Creates the directory if it doesn't exist. Returns the written path.
    pub fn save(&self, store: &ScheduleStore) -> Result<PathBuf, PersistError> {
        if !self.dir.as_os_str().is_empty() && !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|source| PersistError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;
        }

        let path = self.path_for(store.config_hash());
        let json = serde_json::to_string(store)?;
        std::fs::write(&path, json).map_err(|source| PersistError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}
