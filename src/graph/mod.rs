//! Task dependency graph.
//!
//! This module provides the in-memory task graph:
//! - Hierarchical task/subtask ids ("5.2.1") with numeric ordering
//! - Tasks with title, status, priority, and dependency edges
//! - Dependency validation and deterministic repair
//! - A next-eligible-task selector
//! - Subtree move/renumber with dependency remapping
//!
//! The graph is an explicit object owned by the caller for the duration
//! of one command invocation; persistence lives in [`crate::snapshot`].
//!
//! # Example
//!
//! ```
//! use prdflow::graph::{NewTask, Priority, Status, TaskGraph};
//!
//! let mut graph = TaskGraph::new();
//! let setup = graph.add_task(NewTask { title: "Set up CI".into(), ..NewTask::default() }).unwrap();
//! let deploy = graph.add_task(NewTask {
//!     title: "Deploy".into(),
//!     priority: Priority::High,
//!     dependencies: vec![setup.id.clone()],
//!     ..NewTask::default()
//! }).unwrap();
//!
//! // "Deploy" is not eligible until "Set up CI" is done.
//! graph.set_status(&setup.id, Status::Done).unwrap();
//! assert_eq!(graph.next_task().into_task().unwrap().id, deploy.id);
//! ```

pub mod id;
pub mod models;
pub mod moves;
pub mod next;
pub mod validate;

pub use id::{ParseTaskIdError, TaskId};
pub use models::{
    InvalidPriority, InvalidStatus, NewTask, PrdSource, Priority, SourceFilter, Status, Task,
    TaskFilter, TaskUpdate,
};
pub use moves::{ConflictPolicy, DependencyUpdate, MoveOptions, MoveReport};
pub use next::NextOutcome;
pub use validate::{BrokenCycle, FixOptions, FixSummary, Violation};

use crate::error::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Current time as an ISO 8601 string, second precision, UTC.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Summary of a cascading task removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReport {
    /// Every id removed (the task and all its descendants).
    pub removed: Vec<TaskId>,
    /// Dependency edges scrubbed from other tasks because their target
    /// was removed, as `(task, former dependency)` pairs.
    pub cleaned_dependencies: Vec<(TaskId, TaskId)>,
}

/// The in-memory task graph.
///
/// Owns the full tree of tasks and subtasks for one command invocation.
/// All mutation goes through methods that uphold the graph invariants:
/// sibling-unique ids, resolvable dependencies, and acyclicity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    pub(crate) tasks: Vec<Task>,
}

impl TaskGraph {
    /// Create an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Build a graph from deserialized tasks, checking structure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if sibling ids collide, or
    /// [`Error::InvalidReference`] if a subtask id does not extend its
    /// parent id by exactly one segment (or a top-level id is nested).
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self> {
        check_structure(&tasks, None)?;
        Ok(Self { tasks })
    }

    /// The top-level tasks, in insertion order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Consume the graph, yielding the top-level tasks for serialization.
    #[must_use]
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Whether the graph contains no tasks at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total number of tasks and subtasks.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.flatten().len()
    }

    /// All tasks and subtasks in depth-first order.
    ///
    /// Depth-first order doubles as insertion order for tie-breaking.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Task> {
        let mut out = Vec::new();
        fn walk<'a>(tasks: &'a [Task], out: &mut Vec<&'a Task>) {
            for task in tasks {
                out.push(task);
                walk(&task.subtasks, out);
            }
        }
        walk(&self.tasks, &mut out);
        out
    }

    /// Look up a task or subtask by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        let mut level: &[Task] = &self.tasks;
        for depth in 1..id.depth() {
            let prefix = id.truncate(depth);
            level = &level.iter().find(|t| t.id == prefix)?.subtasks;
        }
        level.iter().find(|t| t.id == *id)
    }

    /// Look up a task or subtask by id, mutably.
    pub(crate) fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        let mut level: &mut Vec<Task> = &mut self.tasks;
        for depth in 1..id.depth() {
            let prefix = id.truncate(depth);
            level = &mut level.iter_mut().find(|t| t.id == prefix)?.subtasks;
        }
        level.iter_mut().find(|t| t.id == *id)
    }

    /// Whether the graph contains the given id.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    /// The sibling list a child of `parent` belongs to, mutably.
    /// `None` parent means the top level.
    pub(crate) fn siblings_mut(&mut self, parent: Option<&TaskId>) -> Option<&mut Vec<Task>> {
        match parent {
            None => Some(&mut self.tasks),
            Some(id) => self.get_mut(id).map(|t| &mut t.subtasks),
        }
    }

    /// Next free sequence number under `parent` (max existing + 1).
    #[must_use]
    pub fn next_seq(&self, parent: Option<&TaskId>) -> u64 {
        let siblings: &[Task] = match parent {
            None => &self.tasks,
            Some(id) => self.get(id).map_or(&[], |t| &t.subtasks),
        };
        siblings.iter().map(|t| t.id.last_seq()).max().unwrap_or(0) + 1
    }

    /// Add a task or subtask, assigning the next free sibling sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the parent does not exist,
    /// [`Error::InvalidReference`] if a dependency does not resolve, or
    /// [`Error::CycleDetected`] if the dependencies would close a cycle.
    pub fn add_task(&mut self, new: NewTask) -> Result<Task> {
        if let Some(parent) = &new.parent {
            if !self.contains(parent) {
                return Err(Error::NotFound(parent.to_string()));
            }
        }
        let seq = self.next_seq(new.parent.as_ref());
        let id = new.parent.as_ref().map_or_else(|| TaskId::root(seq), |p| p.child(seq));

        for dep in &new.dependencies {
            if !self.contains(dep) {
                return Err(Error::InvalidReference {
                    from: id.to_string(),
                    to: dep.to_string(),
                    reason: "dependency does not resolve to an existing task".to_string(),
                });
            }
            if *dep == id {
                return Err(Error::InvalidReference {
                    from: id.to_string(),
                    to: dep.to_string(),
                    reason: "a task cannot depend on itself".to_string(),
                });
            }
        }

        let mut dependencies = new.dependencies;
        dependencies.sort();
        dependencies.dedup();

        let task = Task {
            id: id.clone(),
            title: new.title,
            description: new.description,
            details: new.details,
            test_strategy: new.test_strategy,
            status: Status::Pending,
            priority: new.priority,
            dependencies,
            subtasks: Vec::new(),
            prd_source: None,
            updated_at: now_iso(),
        };

        // A fresh leaf cannot be depended on yet, so its outgoing edges
        // cannot close a cycle; no cycle check needed here.
        match self.siblings_mut(new.parent.as_ref()) {
            Some(siblings) => siblings.push(task.clone()),
            None => return Err(Error::NotFound(id.to_string())),
        }
        Ok(task)
    }

    /// Batch-insert tasks generated from one PRD, stamping provenance.
    ///
    /// Tasks are inserted top-level in order; dependencies may reference
    /// tasks inserted earlier in the same batch or pre-existing tasks.
    ///
    /// # Errors
    ///
    /// Returns the first insertion error; tasks inserted before the
    /// failure remain (the caller aborts persistence on error, so the
    /// on-disk snapshot is unaffected).
    pub fn import_tasks(&mut self, source: &PrdSource, batch: Vec<NewTask>) -> Result<Vec<TaskId>> {
        let mut inserted = Vec::with_capacity(batch.len());
        for mut new in batch {
            new.parent = None;
            let task = self.add_task(new)?;
            if let Some(stored) = self.get_mut(&task.id) {
                stored.prd_source = Some(source.clone());
            }
            inserted.push(task.id);
        }
        Ok(inserted)
    }

    /// Update a task's editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id does not exist.
    pub fn update_task(&mut self, id: &TaskId, update: TaskUpdate) -> Result<Task> {
        let task = self.get_mut(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        if update.is_empty() {
            return Ok(task.clone());
        }
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(details) = update.details {
            task.details = details;
        }
        if let Some(test_strategy) = update.test_strategy {
            task.test_strategy = test_strategy;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        task.updated_at = now_iso();
        Ok(task.clone())
    }

    /// Set a task's status. `Done` cascades to all descendants.
    ///
    /// Returns every id whose status actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id does not exist.
    pub fn set_status(&mut self, id: &TaskId, status: Status) -> Result<Vec<TaskId>> {
        let now = now_iso();
        let task = self.get_mut(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        let mut changed = Vec::new();

        fn apply(task: &mut Task, status: Status, cascade: bool, now: &str, changed: &mut Vec<TaskId>) {
            if task.status != status {
                task.status = status;
                task.updated_at = now.to_string();
                changed.push(task.id.clone());
            }
            if cascade {
                for sub in &mut task.subtasks {
                    apply(sub, status, true, now, changed);
                }
            }
        }

        apply(task, status, status == Status::Done, &now, &mut changed);
        Ok(changed)
    }

    /// Remove a task and its whole subtree.
    ///
    /// Other tasks' dependency entries pointing into the removed subtree
    /// are scrubbed; every scrubbed edge is named in the report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id does not exist.
    pub fn remove_task(&mut self, id: &TaskId) -> Result<RemovalReport> {
        if !self.contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        let siblings = self
            .siblings_mut(id.parent().as_ref())
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let pos = siblings
            .iter()
            .position(|t| t.id == *id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let removed_root = siblings.remove(pos);

        let mut removed = Vec::new();
        fn collect_ids(task: &Task, out: &mut Vec<TaskId>) {
            out.push(task.id.clone());
            for sub in &task.subtasks {
                collect_ids(sub, out);
            }
        }
        collect_ids(&removed_root, &mut removed);

        let now = now_iso();
        let mut cleaned = Vec::new();
        fn scrub(tasks: &mut [Task], removed: &[TaskId], now: &str, cleaned: &mut Vec<(TaskId, TaskId)>) {
            for task in tasks {
                let before = task.dependencies.len();
                task.dependencies.retain(|dep| {
                    if removed.contains(dep) {
                        cleaned.push((task.id.clone(), dep.clone()));
                        false
                    } else {
                        true
                    }
                });
                if task.dependencies.len() != before {
                    task.updated_at = now.to_string();
                }
                scrub(&mut task.subtasks, removed, now, cleaned);
            }
        }
        scrub(&mut self.tasks, &removed, &now, &mut cleaned);

        Ok(RemovalReport { removed, cleaned_dependencies: cleaned })
    }

    /// Add a dependency edge: `id` cannot start until `depends_on` is done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either id does not exist,
    /// [`Error::InvalidReference`] for a self-dependency,
    /// [`Error::DuplicateDependency`] if the edge already exists, or
    /// [`Error::CycleDetected`] if the edge would close a cycle.
    pub fn add_dependency(&mut self, id: &TaskId, depends_on: &TaskId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        if !self.contains(depends_on) {
            return Err(Error::NotFound(depends_on.to_string()));
        }
        if id == depends_on {
            return Err(Error::InvalidReference {
                from: id.to_string(),
                to: depends_on.to_string(),
                reason: "a task cannot depend on itself".to_string(),
            });
        }
        if let Some(task) = self.get(id) {
            if task.dependencies.contains(depends_on) {
                return Err(Error::DuplicateDependency {
                    task: id.to_string(),
                    depends_on: depends_on.to_string(),
                });
            }
        }
        if let Some(path) = self.dependency_path(depends_on, id) {
            let mut ids: Vec<String> = vec![id.to_string()];
            ids.extend(path.iter().map(ToString::to_string));
            return Err(Error::CycleDetected { ids });
        }

        let now = now_iso();
        if let Some(task) = self.get_mut(id) {
            task.dependencies.push(depends_on.clone());
            task.updated_at = now;
        }
        Ok(())
    }

    /// Remove a dependency edge. Returns whether an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` does not exist.
    pub fn remove_dependency(&mut self, id: &TaskId, depends_on: &TaskId) -> Result<bool> {
        let now = now_iso();
        let task = self.get_mut(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        let before = task.dependencies.len();
        task.dependencies.retain(|dep| dep != depends_on);
        let removed = task.dependencies.len() != before;
        if removed {
            task.updated_at = now;
        }
        Ok(removed)
    }

    /// List tasks and subtasks matching a filter, in depth-first order.
    ///
    /// PRD-source filters match against the top-level ancestor's
    /// provenance, since subtasks inherit their root task's origin.
    #[must_use]
    pub fn list(&self, filter: &TaskFilter) -> Vec<&Task> {
        let mut out = Vec::new();
        for root in &self.tasks {
            let source_ok = match filter.source {
                None => true,
                Some(SourceFilter::ManualOnly) => root.prd_source.is_none(),
                Some(SourceFilter::PrdOnly) => root.prd_source.is_some(),
            };
            let prd_ok = filter.prd_file.as_ref().map_or(true, |path| {
                root.prd_source.as_ref().is_some_and(|s| s.file_path == *path)
            });
            if !source_ok || !prd_ok {
                continue;
            }
            fn collect<'a>(task: &'a Task, status: Option<Status>, out: &mut Vec<&'a Task>) {
                if status.map_or(true, |s| task.status == s) {
                    out.push(task);
                }
                for sub in &task.subtasks {
                    collect(sub, status, out);
                }
            }
            collect(root, filter.status, &mut out);
        }
        out
    }

    /// Top-level tasks generated from the given PRD file path.
    #[must_use]
    pub fn tasks_for_prd(&self, file_path: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.prd_source.as_ref().is_some_and(|s| s.file_path == file_path))
            .collect()
    }

    /// Rewrite the provenance path on every top-level task generated
    /// from `old_path`. Returns the ids touched.
    ///
    /// Called when the sync engine relocates a PRD file, so linkage by
    /// path survives the move.
    pub(crate) fn retarget_prd_source(&mut self, old_path: &str, new_path: &str) -> Vec<TaskId> {
        let now = now_iso();
        let mut touched = Vec::new();
        for task in &mut self.tasks {
            if let Some(source) = &mut task.prd_source {
                if source.file_path == old_path {
                    source.file_path = new_path.to_string();
                    task.updated_at = now.clone();
                    touched.push(task.id.clone());
                }
            }
        }
        touched
    }

    /// Dependency adjacency: id -> direct dependency ids, over the whole
    /// graph (dependencies may cross nesting levels).
    pub(crate) fn dependency_map(&self) -> HashMap<TaskId, Vec<TaskId>> {
        self.flatten()
            .into_iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect()
    }

    /// A dependency path from `from` to `to`, if one exists.
    ///
    /// Follows dependency edges transitively; used to pre-check that a
    /// new edge would not close a cycle. The returned path starts at
    /// `from` and ends at `to`.
    pub(crate) fn dependency_path(&self, from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
        let map = self.dependency_map();
        let mut stack = vec![vec![from.clone()]];
        let mut visited = std::collections::HashSet::new();
        while let Some(path) = stack.pop() {
            let last = path.last()?;
            if last == to {
                return Some(path);
            }
            if !visited.insert(last.clone()) {
                continue;
            }
            if let Some(deps) = map.get(last) {
                for dep in deps {
                    let mut next = path.clone();
                    next.push(dep.clone());
                    stack.push(next);
                }
            }
        }
        None
    }
}

/// Recursive structural check used on load: sibling-unique ids and
/// child ids that extend the parent id by exactly one segment.
fn check_structure(tasks: &[Task], parent: Option<&TaskId>) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for task in tasks {
        if !seen.insert(&task.id) {
            return Err(Error::DuplicateId(task.id.to_string()));
        }
        let expected_parent = task.id.parent();
        if expected_parent.as_ref() != parent {
            return Err(Error::InvalidReference {
                from: parent.map_or_else(|| "<root>".to_string(), ToString::to_string),
                to: task.id.to_string(),
                reason: "subtask id does not extend its parent id".to_string(),
            });
        }
        check_structure(&task.subtasks, Some(&task.id))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Parse an id, panicking on bad test input.
    pub fn tid(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    /// A graph with the given (id, deps) pending tasks, built through
    /// the public API so invariants hold.
    pub fn graph_of(specs: &[(&str, &[&str])]) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for (id, _) in specs {
            let id = tid(id);
            ensure_path(&mut graph, &id);
        }
        for (id, deps) in specs {
            let id = tid(id);
            for dep in *deps {
                graph.add_dependency(&id, &tid(dep)).unwrap();
            }
        }
        graph
    }

    /// Create every task along the id's ancestor chain if missing.
    pub fn ensure_path(graph: &mut TaskGraph, id: &TaskId) {
        for depth in 1..=id.depth() {
            let prefix = id.truncate(depth);
            if graph.contains(&prefix) {
                continue;
            }
            let parent = prefix.parent();
            // Fill any sequence gap with filler siblings.
            while graph.next_seq(parent.as_ref()) < prefix.last_seq() {
                let seq = graph.next_seq(parent.as_ref());
                graph
                    .add_task(NewTask {
                        title: format!("filler {seq}"),
                        parent: parent.clone(),
                        ..NewTask::default()
                    })
                    .unwrap();
            }
            graph
                .add_task(NewTask {
                    title: format!("task {prefix}"),
                    parent,
                    ..NewTask::default()
                })
                .unwrap();
        }
    }
}
