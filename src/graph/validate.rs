//! Dependency validation and repair.
//!
//! Validation collects every violation in one pass rather than failing
//! fast, so the fixer can act on the complete set. The fixer reports
//! exactly what it changed; nothing is mutated silently. Cycle breaking
//! is an explicit opt-in with a deterministic edge-selection rule.

use crate::graph::id::TaskId;
use crate::graph::TaskGraph;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A single dependency violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    /// A dependency names an id that does not exist in the graph.
    #[serde(rename_all = "camelCase")]
    DanglingReference {
        /// The task holding the dangling entry.
        task: TaskId,
        /// The unresolvable dependency id.
        dependency: TaskId,
    },
    /// A task depends on itself.
    #[serde(rename_all = "camelCase")]
    SelfDependency {
        /// The offending task.
        task: TaskId,
    },
    /// The same dependency id is listed more than once.
    #[serde(rename_all = "camelCase")]
    DuplicateReference {
        /// The task holding the duplicate entry.
        task: TaskId,
        /// The duplicated dependency id.
        dependency: TaskId,
    },
    /// A dependency cycle.
    #[serde(rename_all = "camelCase")]
    Cycle {
        /// The ids forming the cycle, rotated to start at the smallest
        /// id; the last element depends on the first.
        ids: Vec<TaskId>,
    },
}

/// Options controlling [`TaskGraph::fix_dependencies`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FixOptions {
    /// Whether to break detected cycles by dropping one edge per cycle.
    /// Off by default: cycle removal is destructive enough to warrant
    /// explicit confirmation from the caller.
    pub break_cycles: bool,
}

/// A cycle the fixer broke, and the edge it dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenCycle {
    /// The ids that formed the cycle.
    pub ids: Vec<TaskId>,
    /// The dropped edge as `(task, former dependency)`.
    pub dropped_edge: (TaskId, TaskId),
}

/// Everything [`TaskGraph::fix_dependencies`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixSummary {
    /// Dangling entries removed, as `(task, dependency)` pairs.
    pub removed_dangling: Vec<(TaskId, TaskId)>,
    /// Tasks whose self-dependency was removed.
    pub removed_self: Vec<TaskId>,
    /// Duplicate entries removed, as `(task, dependency)` pairs.
    pub removed_duplicates: Vec<(TaskId, TaskId)>,
    /// Cycles broken (only when `FixOptions::break_cycles` is set).
    pub broken_cycles: Vec<BrokenCycle>,
    /// Cycles detected but left intact.
    pub unresolved_cycles: Vec<Vec<TaskId>>,
}

impl FixSummary {
    /// Whether the fixer changed anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.removed_dangling.is_empty()
            || !self.removed_self.is_empty()
            || !self.removed_duplicates.is_empty()
            || !self.broken_cycles.is_empty()
    }
}

impl TaskGraph {
    /// Validate every dependency edge in the graph.
    ///
    /// Collects all violations: dangling references, self-dependencies,
    /// duplicate entries, and cycles. Cycle detection is a depth-first
    /// search with a recursion stack over the union of all tasks and
    /// subtasks, O(V+E).
    #[must_use]
    pub fn validate_dependencies(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let existing: HashSet<TaskId> =
            self.flatten().into_iter().map(|t| t.id.clone()).collect();

        for task in self.flatten() {
            let mut seen = HashSet::new();
            for dep in &task.dependencies {
                if *dep == task.id {
                    violations.push(Violation::SelfDependency { task: task.id.clone() });
                    continue;
                }
                if !existing.contains(dep) {
                    violations.push(Violation::DanglingReference {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                    continue;
                }
                if !seen.insert(dep.clone()) {
                    violations.push(Violation::DuplicateReference {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        for ids in find_cycles(&self.dependency_map()) {
            violations.push(Violation::Cycle { ids });
        }

        violations
    }

    /// Deterministically repair dependency violations.
    ///
    /// Removes dangling references, self-dependencies, and duplicate
    /// entries in depth-first task order. Cycles are broken only when
    /// `options.break_cycles` is set: per cycle, the dropped edge is the
    /// one with the greatest source id (tie: greatest target id).
    /// The summary names every removed edge and any cycles left intact.
    pub fn fix_dependencies(&mut self, options: FixOptions) -> FixSummary {
        let mut summary = FixSummary::default();
        let existing: HashSet<TaskId> =
            self.flatten().into_iter().map(|t| t.id.clone()).collect();
        let now = super::now_iso();

        fn clean(
            tasks: &mut [super::Task],
            existing: &HashSet<TaskId>,
            now: &str,
            summary: &mut FixSummary,
        ) {
            for task in tasks {
                let original = task.dependencies.len();
                let mut kept = Vec::with_capacity(original);
                let mut seen = HashSet::new();
                for dep in task.dependencies.drain(..) {
                    if dep == task.id {
                        summary.removed_self.push(task.id.clone());
                    } else if !existing.contains(&dep) {
                        summary.removed_dangling.push((task.id.clone(), dep));
                    } else if !seen.insert(dep.clone()) {
                        summary.removed_duplicates.push((task.id.clone(), dep));
                    } else {
                        kept.push(dep);
                    }
                }
                if kept.len() != original {
                    task.updated_at = now.to_string();
                }
                task.dependencies = kept;
                clean(&mut task.subtasks, existing, now, summary);
            }
        }
        clean(&mut self.tasks, &existing, &now, &mut summary);

        loop {
            let cycles = find_cycles(&self.dependency_map());
            if cycles.is_empty() {
                break;
            }
            if !options.break_cycles {
                summary.unresolved_cycles = cycles;
                break;
            }
            // Break one cycle per pass; later passes see the reduced graph.
            let ids = cycles.into_iter().next().unwrap_or_default();
            let Some((source, target)) = pick_edge_to_drop(&ids) else {
                break;
            };
            if let Some(task) = self.get_mut(&source) {
                task.dependencies.retain(|dep| *dep != target);
                task.updated_at = now.clone();
            }
            summary.broken_cycles.push(BrokenCycle { ids, dropped_edge: (source, target) });
        }

        summary
    }
}

/// The cycle edge to drop: greatest source id, tie broken by greatest
/// target id. `ids` is the cycle in path order; each element depends on
/// the next, and the last depends on the first.
fn pick_edge_to_drop(ids: &[TaskId]) -> Option<(TaskId, TaskId)> {
    if ids.is_empty() {
        return None;
    }
    let mut best: Option<(TaskId, TaskId)> = None;
    for (i, source) in ids.iter().enumerate() {
        let target = &ids[(i + 1) % ids.len()];
        let candidate = (source.clone(), target.clone());
        if best.as_ref().map_or(true, |b| candidate > *b) {
            best = Some(candidate);
        }
    }
    best
}

/// Find dependency cycles with a colored depth-first search.
///
/// Each reported cycle lists its ids in dependency order (each element
/// depends on the next, the last on the first), rotated to start at the
/// smallest id so reports are deterministic.
fn find_cycles(map: &HashMap<TaskId, Vec<TaskId>>) -> Vec<Vec<TaskId>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn dfs(
        node: &TaskId,
        map: &HashMap<TaskId, Vec<TaskId>>,
        color: &mut HashMap<TaskId, Color>,
        stack: &mut Vec<TaskId>,
        cycles: &mut Vec<Vec<TaskId>>,
    ) {
        color.insert(node.clone(), Color::Gray);
        stack.push(node.clone());

        let mut deps: Vec<&TaskId> = map.get(node).map(|d| d.iter().collect()).unwrap_or_default();
        deps.sort();
        for dep in deps {
            if !map.contains_key(dep) {
                continue; // dangling; reported separately
            }
            match color.get(dep).copied().unwrap_or(Color::White) {
                Color::White => dfs(dep, map, color, stack, cycles),
                Color::Gray => {
                    if let Some(start) = stack.iter().position(|id| id == dep) {
                        cycles.push(rotate_to_min(stack[start..].to_vec()));
                    }
                }
                Color::Black => {}
            }
        }

        stack.pop();
        color.insert(node.clone(), Color::Black);
    }

    let mut nodes: Vec<&TaskId> = map.keys().collect();
    nodes.sort();

    let mut color = HashMap::new();
    let mut stack = Vec::new();
    let mut cycles = Vec::new();
    for node in nodes {
        if color.get(node).copied().map_or(true, |c| matches!(c, Color::White)) {
            dfs(node, map, &mut color, &mut stack, &mut cycles);
        }
    }
    cycles
}

/// Rotate a cycle so its smallest id comes first.
fn rotate_to_min(mut ids: Vec<TaskId>) -> Vec<TaskId> {
    if let Some(min_pos) = ids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
    {
        ids.rotate_left(min_pos);
    }
    ids
}
