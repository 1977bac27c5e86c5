//! Configuration management for `prdflow`.
//!
//! This module handles the `.prdflow/config.yaml` file which stores
//! per-workspace locations for the task snapshot, the PRD registry,
//! and the PRD lifecycle directory root. All paths are relative to the
//! workspace base directory.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file path relative to the workspace root.
pub const CONFIG_FILE_PATH: &str = ".prdflow/config.yaml";

fn default_tasks_file() -> PathBuf {
    PathBuf::from(".prdflow/tasks.json")
}

fn default_prd_registry_file() -> PathBuf {
    PathBuf::from(".prdflow/prds.json")
}

fn default_prd_root() -> PathBuf {
    PathBuf::from("prds")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from(".prdflow/state.lock")
}

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Task snapshot file, relative to the workspace root.
    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,

    /// PRD registry file, relative to the workspace root.
    #[serde(default = "default_prd_registry_file")]
    pub prd_registry_file: PathBuf,

    /// Root of the PRD lifecycle directories, relative to the
    /// workspace root.
    #[serde(default = "default_prd_root")]
    pub prd_root: PathBuf,

    /// Advisory lock file guarding load→mutate→persist cycles.
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            tasks_file: default_tasks_file(),
            prd_registry_file: default_prd_registry_file(),
            prd_root: default_prd_root(),
            lock_file: default_lock_file(),
        }
    }
}

impl ProjectConfig {
    /// Load config from a workspace root, returning `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = base_dir.join(CONFIG_FILE_PATH);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Save config under a workspace root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = base_dir.join(CONFIG_FILE_PATH);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a workspace root.
    #[must_use]
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }

    /// Absolute task snapshot path for a workspace root.
    #[must_use]
    pub fn tasks_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.tasks_file)
    }

    /// Absolute PRD registry path for a workspace root.
    #[must_use]
    pub fn prd_registry_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.prd_registry_file)
    }

    /// Absolute PRD lifecycle root for a workspace root.
    #[must_use]
    pub fn prd_root_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.prd_root)
    }

    /// Absolute lock file path for a workspace root.
    #[must_use]
    pub fn lock_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.lock_file)
    }
}
