//! Error types for `prdflow`.

use std::path::PathBuf;

/// Errors that can occur in the task graph and PRD sync engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A task id was not found in the graph.
    #[error("task not found: {0}")]
    NotFound(String),

    /// A PRD identifier was not found in the registry.
    #[error("PRD not found: {0}")]
    PrdNotFound(String),

    /// A reference names a nonexistent or unreachable id.
    #[error("invalid reference from '{from}' to '{to}': {reason}")]
    InvalidReference {
        /// The id holding the reference.
        from: String,
        /// The id being referenced.
        to: String,
        /// Why the reference is invalid.
        reason: String,
    },

    /// An operation would introduce a dependency cycle.
    #[error("dependency cycle detected: {}", ids.join(" -> "))]
    CycleDetected {
        /// The id sequence forming the cycle.
        ids: Vec<String>,
    },

    /// An id collides with an existing task or PRD in the same scope.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// A duplicate dependency edge already exists.
    #[error("task '{task}' already depends on '{depends_on}'")]
    DuplicateDependency {
        /// The dependent task.
        task: String,
        /// The dependency target.
        depends_on: String,
    },

    /// A snapshot file failed schema validation on load.
    #[error("malformed snapshot {path}: {message}")]
    MalformedSnapshot {
        /// The snapshot file path.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A move destination id is already occupied.
    #[error("move conflict: destination id '{0}' is occupied")]
    MoveConflict(String),

    /// A malformed task id string.
    #[error("invalid task id: {0}")]
    InvalidId(#[from] crate::graph::id::ParseTaskIdError),

    /// The advisory snapshot lock could not be acquired.
    #[error("failed to acquire snapshot lock at {path}: {message}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// The underlying failure.
        message: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
