//! Task model types for the dependency graph.

use crate::graph::id::TaskId;
use serde::{Deserialize, Serialize};

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Task has not been started.
    #[default]
    Pending,
    /// Task is actively being worked on.
    InProgress,
    /// Task has been completed.
    Done,
    /// Task is awaiting review.
    Review,
    /// Task is blocked on something outside the graph.
    Blocked,
    /// Task is postponed.
    Deferred,
    /// Task will not be done.
    Cancelled,
}

impl Status {
    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidStatus> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "review" => Ok(Self::Review),
            "blocked" => Ok(Self::Blocked),
            "deferred" => Ok(Self::Deferred),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Review => "review",
            Self::Blocked => "blocked",
            Self::Deferred => "deferred",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid status: '{}' (must be one of: pending, in-progress, done, review, blocked, deferred, cancelled)",
            self.0
        )
    }
}

impl std::error::Error for InvalidStatus {}

/// Task priority levels. Ordering is `Low < Medium < High` so the
/// selector can take the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Parse a priority from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid priority.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidPriority> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }

    /// Get the string representation of the priority.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid priority string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriority(pub String);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority: '{}' (must be one of: low, medium, high)", self.0)
    }
}

impl std::error::Error for InvalidPriority {}

/// Provenance linking a task to the PRD file it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdSource {
    /// Current path of the originating PRD file. Rewritten whenever
    /// the sync engine relocates the file, so linkage stays by path.
    pub file_path: String,
    /// Base name of the PRD file.
    pub file_name: String,
    /// ISO 8601 timestamp when the PRD was parsed.
    pub parsed_date: String,
    /// Content hash of the PRD at parse time (lowercase hex SHA-256).
    pub file_hash: String,
    /// Size of the PRD file in bytes at parse time.
    pub file_size: u64,
}

/// A task in the dependency graph.
///
/// Subtasks nest recursively; a subtask's id extends its parent's id by
/// one dot-separated sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Hierarchical id, e.g. "5.2.1".
    pub id: TaskId,
    /// Short title describing the task.
    pub title: String,
    /// Detailed description of the task.
    #[serde(default)]
    pub description: String,
    /// Implementation notes.
    #[serde(default)]
    pub details: String,
    /// How the task should be verified.
    #[serde(default)]
    pub test_strategy: String,
    /// Current status.
    #[serde(default)]
    pub status: Status,
    /// Priority level.
    #[serde(default)]
    pub priority: Priority,
    /// Ids this task depends on. A set: unique, order irrelevant.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Ordered child tasks.
    #[serde(default)]
    pub subtasks: Vec<Task>,
    /// The PRD this task was generated from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd_source: Option<PrdSource>,
    /// ISO 8601 timestamp when the task was last updated.
    #[serde(default)]
    pub updated_at: String,
}

impl Task {
    /// Check if the task is in a terminal state.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.status, Status::Done | Status::Cancelled)
    }

    /// Number of descendants (subtasks at any depth, excluding self).
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.subtasks.iter().map(|t| 1 + t.descendant_count()).sum()
    }
}

/// Fields for creating a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Short title describing the task.
    pub title: String,
    /// Detailed description of the task.
    pub description: String,
    /// Implementation notes.
    pub details: String,
    /// How the task should be verified.
    pub test_strategy: String,
    /// Priority level.
    pub priority: Priority,
    /// Ids the new task depends on.
    pub dependencies: Vec<TaskId>,
    /// Parent id, or `None` for a top-level task.
    pub parent: Option<TaskId>,
}

/// Fields that can be updated on a task.
#[derive(Debug, Default, Clone)]
pub struct TaskUpdate {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some).
    pub description: Option<String>,
    /// New details (if Some).
    pub details: Option<String>,
    /// New test strategy (if Some).
    pub test_strategy: Option<String>,
    /// New priority (if Some).
    pub priority: Option<Priority>,
}

impl TaskUpdate {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.details.is_none()
            && self.test_strategy.is_none()
            && self.priority.is_none()
    }
}

/// Restrict a listing to tasks by provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    /// Only tasks with no PRD source.
    ManualOnly,
    /// Only tasks generated from a PRD.
    PrdOnly,
}

/// Filter options for listing tasks.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    /// Filter by status.
    pub status: Option<Status>,
    /// Filter by originating PRD file path.
    pub prd_file: Option<String>,
    /// Filter by provenance.
    pub source: Option<SourceFilter>,
}
