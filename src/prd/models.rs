//! PRD registry model types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lifecycle status of a PRD. `Archived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrdStatus {
    /// No linked task has started.
    #[default]
    Pending,
    /// Some linked work has started.
    InProgress,
    /// Every linked task is done.
    Done,
    /// Explicitly retired; excluded from sync.
    Archived,
}

impl PrdStatus {
    /// Parse a PRD status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid PRD status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidPrdStatus> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            _ => Err(InvalidPrdStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    ///
    /// Doubles as the lifecycle directory name for the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for PrdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid PRD status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPrdStatus(pub String);

impl std::fmt::Display for InvalidPrdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid PRD status: '{}' (must be one of: pending, in-progress, done, archived)",
            self.0
        )
    }
}

impl std::error::Error for InvalidPrdStatus {}

/// One tracked PRD file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prd {
    /// Stable identifier, e.g. "prd_1".
    pub prd_identifier: String,
    /// Current on-disk path of the PRD file.
    pub file_path: String,
    /// Base name of the PRD file.
    pub file_name: String,
    /// Content hash (lowercase hex SHA-256), the drift baseline.
    pub file_hash: String,
    /// File size in bytes at the last metadata update.
    pub file_size: u64,
    /// Lifecycle status; derived by the sync engine, never hand-set.
    #[serde(default)]
    pub status: PrdStatus,
    /// ISO 8601 timestamp when the PRD was parsed into tasks.
    pub parsed_date: String,
    /// ISO 8601 timestamp of the last metadata update.
    pub last_modified: String,
}

/// The PRD lifecycle directories under a common root.
///
/// Each directory must contain exactly the files whose registry status
/// matches it, once the sync engine has placed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrdDirs {
    root: PathBuf,
}

impl PrdDirs {
    /// Create the directory mapping under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory holding the lifecycle subdirectories.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory for a given status.
    #[must_use]
    pub fn dir_for(&self, status: PrdStatus) -> PathBuf {
        self.root.join(status.as_str())
    }

    /// Where a file with the given name belongs for a given status.
    #[must_use]
    pub fn path_for(&self, status: PrdStatus, file_name: &str) -> PathBuf {
        self.dir_for(status).join(file_name)
    }
}
