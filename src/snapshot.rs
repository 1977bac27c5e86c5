//! Atomic JSON snapshot persistence with an advisory file lock.
//!
//! Snapshots are written to a temporary file, synced, then renamed over
//! the target, so the on-disk file is always either the old or the new
//! valid snapshot. An exclusive advisory lock guards each
//! load→mutate→persist cycle against a second process racing on the
//! same files; the lock is advisory, so it only protects against
//! writers that also take it.

use crate::error::{Error, Result};
use crate::graph::Task;
use crate::prd::Prd;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// On-disk form of the task snapshot: `{ "tasks": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksSnapshot {
    /// Top-level tasks, subtasks nested inside.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// On-disk form of the PRD registry: `{ "prds": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrdsSnapshot {
    /// One record per tracked PRD file.
    #[serde(default)]
    pub prds: Vec<Prd>,
}

/// Exclusive advisory lock held for one load→mutate→persist cycle.
///
/// Released on drop. Blocks until any competing holder releases.
#[derive(Debug)]
pub struct SnapshotLock {
    file: File,
}

impl SnapshotLock {
    /// Acquire the lock at the given lock-file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] if the lock cannot be acquired, or an
    /// I/O error if the lock file cannot be created.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        FileExt::lock_exclusive(&file).map_err(|e| Error::Lock {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self { file })
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// The temporary-file path used while writing `path` atomically.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Load a JSON snapshot, returning `None` if the file does not exist.
///
/// # Errors
///
/// Returns [`Error::MalformedSnapshot`] if the file exists but fails to
/// parse against the schema, or an I/O error if it cannot be read.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map(Some).map_err(|e| Error::MalformedSnapshot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a JSON snapshot atomically: temp file, sync, rename.
///
/// # Errors
///
/// Returns an I/O error if writing or renaming fails.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(&tmp)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}
