//! PRD status synchronization.
//!
//! Split into a pure planner and a filesystem effects adapter so the
//! derivation rules are unit-testable without touching disk. Per PRD,
//! the file relocation, the registry record update, and the linked
//! tasks' provenance rewrite are applied together or not at all: the
//! move happens first, and a failed move leaves both stores untouched
//! and aborts the run. A relocation that finds the file already at its
//! target (an earlier run moved it but nothing was persisted) is
//! treated as done, so a re-run converges instead of failing.

use crate::error::{Error, Result};
use crate::graph::TaskGraph;
use crate::prd::models::{Prd, PrdDirs, PrdStatus};
use crate::prd::registry::PrdRegistry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which PRDs a sync run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// Every non-archived PRD in the registry.
    All,
    /// One PRD by identifier.
    Prd(String),
}

/// A planned file move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relocation {
    /// Current path of the PRD file.
    pub from: PathBuf,
    /// Where the file belongs under the new status.
    pub to: PathBuf,
}

/// A planned status change for one PRD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdTransition {
    /// The PRD's identifier.
    pub prd_identifier: String,
    /// Status before the transition.
    pub from: PrdStatus,
    /// Status after the transition.
    pub to: PrdStatus,
    /// The accompanying file move, if the path changes.
    pub relocation: Option<Relocation>,
}

/// The full set of transitions one sync run would apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// Planned transitions, in registry order.
    pub transitions: Vec<PrdTransition>,
}

impl SyncPlan {
    /// Whether the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// What a sync run actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Transitions applied, in order.
    pub applied: Vec<PrdTransition>,
}

/// Filesystem effects needed by the sync engine.
///
/// Abstracted so the apply step can be tested against a recording mock.
pub trait PrdFileOps {
    /// Move a PRD file, preserving its bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the move fails.
    fn relocate(&mut self, from: &Path, to: &Path) -> Result<()>;
}

/// The real filesystem adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPrdFileOps;

impl PrdFileOps for FsPrdFileOps {
    fn relocate(&mut self, from: &Path, to: &Path) -> Result<()> {
        // An interrupted earlier run may have moved the file without
        // persisting the record; treat that as already done.
        if !from.exists() && to.exists() {
            debug!(from = %from.display(), to = %to.display(), "PRD file already at target");
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(from, to)?;
        debug!(from = %from.display(), to = %to.display(), "relocated PRD file");
        Ok(())
    }
}

/// Derive a PRD's status from its linked tasks.
///
/// Linkage is by provenance path: top-level tasks whose
/// `prd_source.file_path` matches the record's current path. `None`
/// means "leave the current status unchanged": a PRD with zero linked
/// tasks never auto-transitions, and a PRD whose tasks are all still
/// pending keeps whatever status it has.
#[must_use]
pub fn derive_status(prd: &Prd, graph: &TaskGraph) -> Option<PrdStatus> {
    use crate::graph::Status;

    let linked = graph.tasks_for_prd(&prd.file_path);
    if linked.is_empty() {
        return None;
    }
    if linked.iter().all(|t| t.status == Status::Done) {
        return Some(PrdStatus::Done);
    }
    if linked.iter().any(|t| matches!(t.status, Status::InProgress | Status::Done)) {
        return Some(PrdStatus::InProgress);
    }
    None
}

/// Plan a sync run. Pure: reads both stores, touches nothing.
///
/// # Errors
///
/// Returns [`Error::PrdNotFound`] if a named target is unknown.
pub fn plan_sync(
    registry: &PrdRegistry,
    graph: &TaskGraph,
    target: &SyncTarget,
    dirs: &PrdDirs,
) -> Result<SyncPlan> {
    let selected: Vec<&Prd> = match target {
        SyncTarget::All => registry.prds().iter().collect(),
        SyncTarget::Prd(id) => {
            vec![registry.get(id).ok_or_else(|| Error::PrdNotFound(id.clone()))?]
        }
    };

    let mut transitions = Vec::new();
    for prd in selected {
        if prd.status == PrdStatus::Archived {
            continue;
        }
        let Some(derived) = derive_status(prd, graph) else {
            continue;
        };
        if derived == prd.status {
            continue;
        }
        transitions.push(transition(prd, derived, dirs));
    }
    Ok(SyncPlan { transitions })
}

/// Plan an explicit archive request for one PRD.
///
/// Archiving an already-archived PRD is a no-op plan.
///
/// # Errors
///
/// Returns [`Error::PrdNotFound`] if the identifier is unknown.
pub fn plan_archive(registry: &PrdRegistry, prd_identifier: &str, dirs: &PrdDirs) -> Result<SyncPlan> {
    let prd = registry
        .get(prd_identifier)
        .ok_or_else(|| Error::PrdNotFound(prd_identifier.to_string()))?;
    if prd.status == PrdStatus::Archived {
        return Ok(SyncPlan::default());
    }
    Ok(SyncPlan { transitions: vec![transition(prd, PrdStatus::Archived, dirs)] })
}

fn transition(prd: &Prd, to: PrdStatus, dirs: &PrdDirs) -> PrdTransition {
    let target_path = dirs.path_for(to, &prd.file_name);
    let current_path = PathBuf::from(&prd.file_path);
    let relocation = if target_path == current_path {
        None
    } else {
        Some(Relocation { from: current_path, to: target_path })
    };
    PrdTransition { prd_identifier: prd.prd_identifier.clone(), from: prd.status, to, relocation }
}

/// Apply a plan: per PRD, move the file first, then update the record
/// and rewrite the linked tasks' provenance to the new path.
///
/// # Errors
///
/// Returns the file-move error of the first failing transition; the
/// failing PRD's record and tasks are left untouched, and earlier
/// transitions remain applied (reported via the partial state of the
/// stores).
pub fn apply_sync(
    plan: &SyncPlan,
    registry: &mut PrdRegistry,
    graph: &mut TaskGraph,
    file_ops: &mut dyn PrdFileOps,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    for t in &plan.transitions {
        if let Some(relocation) = &t.relocation {
            file_ops.relocate(&relocation.from, &relocation.to)?;
        }
        let prd = registry
            .get_mut(&t.prd_identifier)
            .ok_or_else(|| Error::PrdNotFound(t.prd_identifier.clone()))?;
        prd.status = t.to;
        if let Some(relocation) = &t.relocation {
            let old_path = relocation.from.to_string_lossy().into_owned();
            let new_path = relocation.to.to_string_lossy().into_owned();
            graph.retarget_prd_source(&old_path, &new_path);
            prd.file_path = new_path;
        }
        prd.last_modified = crate::graph::now_iso();
        report.applied.push(t.clone());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NewTask, PrdSource, Status};
    use tempfile::TempDir;

    fn dirs() -> PrdDirs {
        PrdDirs::new("prds")
    }

    fn prd_at(id: &str, path: &str, status: PrdStatus) -> Prd {
        Prd {
            prd_identifier: id.to_string(),
            file_path: path.to_string(),
            file_name: Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_hash: "00".repeat(32),
            file_size: 1,
            status,
            parsed_date: "2024-01-01T00:00:00Z".to_string(),
            last_modified: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn link_tasks(graph: &mut TaskGraph, path: &str, statuses: &[Status]) {
        let source = PrdSource {
            file_path: path.to_string(),
            file_name: Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            parsed_date: "2024-01-01T00:00:00Z".to_string(),
            file_hash: String::new(),
            file_size: 0,
        };
        let batch =
            statuses.iter().map(|_| NewTask { title: "t".into(), ..NewTask::default() }).collect();
        let ids = graph.import_tasks(&source, batch).unwrap();
        for (id, status) in ids.iter().zip(statuses) {
            graph.set_status(id, *status).unwrap();
        }
    }

    fn graph_with_statuses(path: &str, statuses: &[Status]) -> TaskGraph {
        let mut graph = TaskGraph::new();
        link_tasks(&mut graph, path, statuses);
        graph
    }

    /// Records moves; optionally fails every call.
    #[derive(Debug, Default)]
    struct MockFileOps {
        moves: Vec<(PathBuf, PathBuf)>,
        fail: bool,
    }

    impl PrdFileOps for MockFileOps {
        fn relocate(&mut self, from: &Path, to: &Path) -> Result<()> {
            if self.fail {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.moves.push((from.to_path_buf(), to.to_path_buf()));
            Ok(())
        }
    }

    #[test]
    fn test_derive_zero_linked_tasks_never_transitions() {
        let prd = prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending);
        assert_eq!(derive_status(&prd, &TaskGraph::new()), None);
    }

    #[test]
    fn test_derive_all_pending_leaves_status() {
        let prd = prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending);
        let graph = graph_with_statuses(&prd.file_path, &[Status::Pending, Status::Pending]);
        assert_eq!(derive_status(&prd, &graph), None);
    }

    #[test]
    fn test_derive_partial_completion_is_in_progress() {
        let prd = prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending);
        let graph = graph_with_statuses(
            &prd.file_path,
            &[Status::Done, Status::Done, Status::Pending],
        );
        assert_eq!(derive_status(&prd, &graph), Some(PrdStatus::InProgress));
    }

    #[test]
    fn test_derive_in_progress_task_is_in_progress() {
        let prd = prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending);
        let graph = graph_with_statuses(&prd.file_path, &[Status::InProgress, Status::Pending]);
        assert_eq!(derive_status(&prd, &graph), Some(PrdStatus::InProgress));
    }

    #[test]
    fn test_derive_all_done_is_done() {
        let prd = prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending);
        let graph = graph_with_statuses(&prd.file_path, &[Status::Done, Status::Done]);
        assert_eq!(derive_status(&prd, &graph), Some(PrdStatus::Done));
    }

    #[test]
    fn test_derive_ignores_other_prd_with_same_file_name() {
        // Two PRDs both named auth.md in different lifecycle dirs; the
        // relocated one has no tasks of its own and must not inherit
        // the other's.
        let prd_1 = prd_at("prd_1", "prds/in-progress/auth.md", PrdStatus::InProgress);
        let graph = graph_with_statuses("prds/pending/auth.md", &[Status::Done]);
        assert_eq!(derive_status(&prd_1, &graph), None);
    }

    #[test]
    fn test_plan_includes_relocation_on_transition() {
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending)).unwrap();
        let graph = graph_with_statuses("prds/pending/auth.md", &[Status::Done]);

        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();
        assert_eq!(plan.transitions.len(), 1);
        let t = &plan.transitions[0];
        assert_eq!(t.to, PrdStatus::Done);
        assert_eq!(
            t.relocation,
            Some(Relocation {
                from: PathBuf::from("prds/pending/auth.md"),
                to: PathBuf::from("prds/done/auth.md"),
            })
        );
    }

    #[test]
    fn test_plan_skips_archived() {
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", "prds/archived/auth.md", PrdStatus::Archived)).unwrap();
        let graph = graph_with_statuses("prds/archived/auth.md", &[Status::Done]);
        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_plan_unknown_target() {
        let registry = PrdRegistry::new();
        let err =
            plan_sync(&registry, &TaskGraph::new(), &SyncTarget::Prd("prd_9".into()), &dirs())
                .unwrap_err();
        assert!(matches!(err, Error::PrdNotFound(id) if id == "prd_9"));
    }

    #[test]
    fn test_plan_keeps_same_named_prds_independent() {
        // prd_1 was relocated earlier and its tasks were removed; prd_2
        // shares the file name and has a done task. Only prd_2 moves.
        let mut registry = PrdRegistry::new();
        registry
            .register(prd_at("prd_1", "prds/in-progress/auth.md", PrdStatus::InProgress))
            .unwrap();
        registry.register(prd_at("prd_2", "prds/pending/auth.md", PrdStatus::Pending)).unwrap();
        let graph = graph_with_statuses("prds/pending/auth.md", &[Status::Done]);

        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();
        assert_eq!(plan.transitions.len(), 1);
        assert_eq!(plan.transitions[0].prd_identifier, "prd_2");

        let plan = plan_sync(&registry, &graph, &SyncTarget::Prd("prd_1".into()), &dirs()).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_apply_moves_file_record_and_provenance_together() {
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending)).unwrap();
        let mut graph = graph_with_statuses("prds/pending/auth.md", &[Status::Done]);
        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();

        let mut ops = MockFileOps::default();
        let report = apply_sync(&plan, &mut registry, &mut graph, &mut ops).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(ops.moves, vec![(
            PathBuf::from("prds/pending/auth.md"),
            PathBuf::from("prds/done/auth.md"),
        )]);
        let prd = registry.get("prd_1").unwrap();
        assert_eq!(prd.status, PrdStatus::Done);
        assert_eq!(prd.file_path, "prds/done/auth.md");
        // Linkage follows the file.
        assert!(graph.tasks_for_prd("prds/pending/auth.md").is_empty());
        assert_eq!(graph.tasks_for_prd("prds/done/auth.md").len(), 1);
    }

    #[test]
    fn test_apply_failed_move_leaves_stores_untouched() {
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending)).unwrap();
        let mut graph = graph_with_statuses("prds/pending/auth.md", &[Status::Done]);
        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();

        let mut ops = MockFileOps { fail: true, ..MockFileOps::default() };
        assert!(apply_sync(&plan, &mut registry, &mut graph, &mut ops).is_err());

        let prd = registry.get("prd_1").unwrap();
        assert_eq!(prd.status, PrdStatus::Pending);
        assert_eq!(prd.file_path, "prds/pending/auth.md");
        assert_eq!(graph.tasks_for_prd("prds/pending/auth.md").len(), 1);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", "prds/pending/auth.md", PrdStatus::Pending)).unwrap();
        let mut graph =
            graph_with_statuses("prds/pending/auth.md", &[Status::Done, Status::Pending]);

        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();
        let mut ops = MockFileOps::default();
        apply_sync(&plan, &mut registry, &mut graph, &mut ops).unwrap();
        assert_eq!(registry.get("prd_1").unwrap().status, PrdStatus::InProgress);

        // Second run with no intervening task change plans nothing: the
        // record, the file, and the provenance all moved together.
        let replan = plan_sync(&registry, &graph, &SyncTarget::All, &dirs()).unwrap();
        assert!(replan.is_noop());
        let before = registry.clone();
        apply_sync(&replan, &mut registry, &mut graph, &mut MockFileOps::default()).unwrap();
        assert_eq!(registry, before);
    }

    #[test]
    fn test_relocate_tolerates_already_moved_file() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("prds/pending/auth.md");
        let to = tmp.path().join("prds/done/auth.md");
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        std::fs::write(&to, "# Auth PRD").unwrap();

        FsPrdFileOps.relocate(&from, &to).unwrap();
        assert!(to.exists());
        assert!(!from.exists());
    }

    #[test]
    fn test_rerun_converges_after_interrupted_apply() {
        // The file was moved by an earlier run but neither store was
        // persisted: both still name the old path. The replanned
        // transition must apply cleanly.
        let tmp = TempDir::new().unwrap();
        let lifecycle = PrdDirs::new(tmp.path().join("prds"));
        let old_path = lifecycle.path_for(PrdStatus::Pending, "auth.md");
        let new_path = lifecycle.path_for(PrdStatus::Done, "auth.md");
        std::fs::create_dir_all(new_path.parent().unwrap()).unwrap();
        std::fs::write(&new_path, "# Auth PRD").unwrap();

        let old_str = old_path.to_string_lossy().into_owned();
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", &old_str, PrdStatus::Pending)).unwrap();
        let mut graph = graph_with_statuses(&old_str, &[Status::Done]);

        let plan = plan_sync(&registry, &graph, &SyncTarget::All, &lifecycle).unwrap();
        let report = apply_sync(&plan, &mut registry, &mut graph, &mut FsPrdFileOps).unwrap();

        assert_eq!(report.applied.len(), 1);
        let prd = registry.get("prd_1").unwrap();
        assert_eq!(prd.status, PrdStatus::Done);
        assert_eq!(prd.file_path, new_path.to_string_lossy());
        assert_eq!(graph.tasks_for_prd(&prd.file_path).len(), 1);
        assert!(new_path.exists());
    }

    #[test]
    fn test_archive_plans_relocation_and_is_idempotent() {
        let mut registry = PrdRegistry::new();
        registry.register(prd_at("prd_1", "prds/done/auth.md", PrdStatus::Done)).unwrap();
        let mut graph = graph_with_statuses("prds/done/auth.md", &[Status::Done]);

        let plan = plan_archive(&registry, "prd_1", &dirs()).unwrap();
        assert_eq!(plan.transitions[0].to, PrdStatus::Archived);
        let mut ops = MockFileOps::default();
        apply_sync(&plan, &mut registry, &mut graph, &mut ops).unwrap();
        assert_eq!(registry.get("prd_1").unwrap().status, PrdStatus::Archived);
        assert_eq!(registry.get("prd_1").unwrap().file_path, "prds/archived/auth.md");
        assert_eq!(graph.tasks_for_prd("prds/archived/auth.md").len(), 1);

        // Archiving again is a no-op.
        assert!(plan_archive(&registry, "prd_1", &dirs()).unwrap().is_noop());
    }
}
