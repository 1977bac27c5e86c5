//! Workspace operation surface.
//!
//! This is the boundary the CLI/menu/MCP layers call. Each operation
//! performs one advisory-locked load→mutate→persist cycle over the task
//! snapshot and PRD registry and returns a structured [`OpResult`].
//! Load-time schema or I/O failures abort before any mutation;
//! persistence happens only after a fully successful in-memory change.

use crate::config::ProjectConfig;
use crate::error::{Error, Result};
use crate::graph::{
    FixOptions, FixSummary, MoveOptions, MoveReport, NewTask, NextOutcome, PrdSource,
    RemovalReport, Status, Task, TaskFilter, TaskGraph, TaskId, TaskUpdate, Violation,
};
use crate::prd::{
    apply_sync, plan_archive, plan_sync, FsPrdFileOps, Prd, PrdChange, PrdDirs, PrdRegistry,
    SyncReport, SyncTarget,
};
use crate::snapshot::{load_json, save_json_atomic, PrdsSnapshot, SnapshotLock, TasksSnapshot};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Structured result returned to the calling layer.
#[derive(Debug, Clone, Serialize)]
pub struct OpResult<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The operation's payload, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// A human-readable error naming the offending id(s), on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> OpResult<T> {
    /// The payload, discarding the envelope.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl<T> From<Result<T>> for OpResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self { success: true, data: Some(data), error: None },
            Err(err) => Self { success: false, data: None, error: Some(err.to_string()) },
        }
    }
}

/// A workspace: base directory, config, and the two snapshot files.
///
/// Stateless between calls; every operation reloads from disk under the
/// advisory lock, mutates in memory, and persists atomically.
#[derive(Debug, Clone)]
pub struct Workspace {
    base_dir: PathBuf,
    config: ProjectConfig,
}

impl Workspace {
    /// Open a workspace, loading its config or falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config = ProjectConfig::load_from(&base_dir)?.unwrap_or_default();
        Ok(Self { base_dir, config })
    }

    /// The workspace configuration.
    #[must_use]
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// The PRD lifecycle directories for this workspace.
    #[must_use]
    pub fn prd_dirs(&self) -> PrdDirs {
        PrdDirs::new(self.config.prd_root_path(&self.base_dir))
    }

    fn lock(&self) -> Result<SnapshotLock> {
        SnapshotLock::acquire(&self.config.lock_path(&self.base_dir))
    }

    fn load_graph(&self) -> Result<TaskGraph> {
        let path = self.config.tasks_path(&self.base_dir);
        let snapshot: TasksSnapshot = load_json(&path)?.unwrap_or_default();
        TaskGraph::from_tasks(snapshot.tasks).map_err(|e| Error::MalformedSnapshot {
            path,
            message: e.to_string(),
        })
    }

    fn save_graph(&self, graph: &TaskGraph) -> Result<()> {
        let snapshot = TasksSnapshot { tasks: graph.tasks().to_vec() };
        save_json_atomic(&self.config.tasks_path(&self.base_dir), &snapshot)
    }

    fn load_registry(&self) -> Result<PrdRegistry> {
        let path = self.config.prd_registry_path(&self.base_dir);
        let snapshot: PrdsSnapshot = load_json(&path)?.unwrap_or_default();
        PrdRegistry::from_prds(snapshot.prds).map_err(|e| Error::MalformedSnapshot {
            path,
            message: e.to_string(),
        })
    }

    fn save_registry(&self, registry: &PrdRegistry) -> Result<()> {
        let snapshot = PrdsSnapshot { prds: registry.prds().to_vec() };
        save_json_atomic(&self.config.prd_registry_path(&self.base_dir), &snapshot)
    }

    /// One locked read-modify-write cycle over the task graph.
    fn with_graph<T>(&self, mutate: impl FnOnce(&mut TaskGraph) -> Result<T>) -> Result<T> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        let out = mutate(&mut graph)?;
        self.save_graph(&graph)?;
        Ok(out)
    }

    /// One locked read-only pass over the task graph.
    fn read_graph<T>(&self, read: impl FnOnce(&TaskGraph) -> T) -> Result<T> {
        let _lock = self.lock()?;
        let graph = self.load_graph()?;
        Ok(read(&graph))
    }

    // ---- Task operations -------------------------------------------------

    /// Add a task or subtask.
    pub fn add_task(&self, new: NewTask) -> OpResult<Task> {
        self.with_graph(|graph| graph.add_task(new)).into()
    }

    /// Update a task's editable fields.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> OpResult<Task> {
        self.with_graph(|graph| graph.update_task(&parse_id(id)?, update)).into()
    }

    /// Remove a task and its subtree, scrubbing dependent edges.
    pub fn remove_task(&self, id: &str) -> OpResult<RemovalReport> {
        self.with_graph(|graph| graph.remove_task(&parse_id(id)?)).into()
    }

    /// Move a subtree to a new id, renumbering and remapping references.
    pub fn move_task(&self, from: &str, to: &str, options: MoveOptions) -> OpResult<MoveReport> {
        self.with_graph(|graph| graph.move_task(&parse_id(from)?, &parse_id(to)?, options)).into()
    }

    /// Add a dependency edge.
    pub fn add_dependency(&self, id: &str, depends_on: &str) -> OpResult<()> {
        self.with_graph(|graph| graph.add_dependency(&parse_id(id)?, &parse_id(depends_on)?))
            .into()
    }

    /// Remove a dependency edge. Data is whether an edge was removed.
    pub fn remove_dependency(&self, id: &str, depends_on: &str) -> OpResult<bool> {
        self.with_graph(|graph| graph.remove_dependency(&parse_id(id)?, &parse_id(depends_on)?))
            .into()
    }

    /// Collect every dependency violation in the graph.
    pub fn validate_dependencies(&self) -> OpResult<Vec<Violation>> {
        self.read_graph(TaskGraph::validate_dependencies).into()
    }

    /// Repair dependency violations, reporting exactly what changed.
    pub fn fix_dependencies(&self, options: FixOptions) -> OpResult<FixSummary> {
        let result = (|| {
            let _lock = self.lock()?;
            let mut graph = self.load_graph()?;
            let summary = graph.fix_dependencies(options);
            if summary.changed() {
                self.save_graph(&graph)?;
            }
            Ok(summary)
        })();
        result.into()
    }

    /// Select the next eligible task.
    pub fn next_task(&self) -> OpResult<NextOutcome> {
        self.read_graph(TaskGraph::next_task).into()
    }

    /// Set a task's status; `done` cascades to subtasks.
    pub fn set_status(&self, id: &str, status: Status) -> OpResult<Vec<TaskId>> {
        self.with_graph(|graph| graph.set_status(&parse_id(id)?, status)).into()
    }

    /// List tasks matching a filter.
    pub fn list_tasks(&self, filter: &TaskFilter) -> OpResult<Vec<Task>> {
        self.read_graph(|graph| graph.list(filter).into_iter().cloned().collect()).into()
    }

    // ---- PRD operations --------------------------------------------------

    /// Start tracking a PRD file. Relative paths resolve against the
    /// workspace root.
    pub fn register_prd(&self, prd_identifier: &str, file_path: &Path) -> OpResult<Prd> {
        let result = (|| {
            let _lock = self.lock()?;
            let mut registry = self.load_registry()?;
            let resolved = self.resolve(file_path);
            let prd = registry.track(prd_identifier, &resolved)?;
            self.save_registry(&registry)?;
            Ok(prd)
        })();
        result.into()
    }

    /// Batch-insert tasks generated from a tracked PRD, stamping each
    /// root task with the PRD's provenance.
    pub fn import_tasks(&self, prd_identifier: &str, batch: Vec<NewTask>) -> OpResult<Vec<TaskId>> {
        let result = (|| {
            let _lock = self.lock()?;
            let registry = self.load_registry()?;
            let prd = registry
                .get(prd_identifier)
                .ok_or_else(|| Error::PrdNotFound(prd_identifier.to_string()))?;
            let source = PrdSource {
                file_path: prd.file_path.clone(),
                file_name: prd.file_name.clone(),
                parsed_date: prd.parsed_date.clone(),
                file_hash: prd.file_hash.clone(),
                file_size: prd.file_size,
            };
            let mut graph = self.load_graph()?;
            let inserted = graph.import_tasks(&source, batch)?;
            self.save_graph(&graph)?;
            Ok(inserted)
        })();
        result.into()
    }

    /// Detect drift for every tracked, non-archived PRD.
    pub fn check_prd_changes(&self) -> OpResult<Vec<PrdChange>> {
        let result = (|| {
            let _lock = self.lock()?;
            let registry = self.load_registry()?;
            let graph = self.load_graph()?;
            registry.check_changes(&graph)
        })();
        result.into()
    }

    /// Reset a PRD's drift baseline without touching generated tasks.
    pub fn update_prd_metadata(&self, prd_identifier: &str) -> OpResult<Prd> {
        let result = (|| {
            let _lock = self.lock()?;
            let mut registry = self.load_registry()?;
            let prd = registry.update_metadata(prd_identifier)?;
            self.save_registry(&registry)?;
            Ok(prd)
        })();
        result.into()
    }

    /// Re-derive PRD status from linked tasks and relocate files
    /// between the lifecycle directories. Idempotent. Relocations
    /// rewrite the linked tasks' provenance paths, so both snapshots
    /// are persisted when anything moved.
    pub fn sync_prd_status(&self, target: &SyncTarget) -> OpResult<SyncReport> {
        let result = (|| {
            let _lock = self.lock()?;
            let mut registry = self.load_registry()?;
            let mut graph = self.load_graph()?;
            let plan = plan_sync(&registry, &graph, target, &self.prd_dirs())?;
            let report = apply_sync(&plan, &mut registry, &mut graph, &mut FsPrdFileOps)?;
            if !report.applied.is_empty() {
                self.save_graph(&graph)?;
                self.save_registry(&registry)?;
            }
            Ok(report)
        })();
        result.into()
    }

    /// Explicitly archive a PRD, relocating its file to `archived/`.
    pub fn archive_prd(&self, prd_identifier: &str) -> OpResult<SyncReport> {
        let result = (|| {
            let _lock = self.lock()?;
            let mut registry = self.load_registry()?;
            let mut graph = self.load_graph()?;
            let plan = plan_archive(&registry, prd_identifier, &self.prd_dirs())?;
            let report = apply_sync(&plan, &mut registry, &mut graph, &mut FsPrdFileOps)?;
            if !report.applied.is_empty() {
                self.save_graph(&graph)?;
                self.save_registry(&registry)?;
            }
            Ok(report)
        })();
        result.into()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn parse_id(id: &str) -> Result<TaskId> {
    Ok(id.parse()?)
}
