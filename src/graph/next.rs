//! Next eligible task selection.
//!
//! A task is eligible when it is pending, every dependency is done, and
//! its ancestor chain is workable (see below). Selection is
//! deterministic: highest priority first, then ascending id, then
//! depth-first insertion order.

use crate::graph::id::TaskId;
use crate::graph::models::{Status, Task};
use crate::graph::TaskGraph;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Result of [`TaskGraph::next_task`].
///
/// The non-task outcomes are distinct so callers can tell an empty
/// graph from a finished one from a blocked one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum NextOutcome {
    /// The next task to work on.
    #[serde(rename_all = "camelCase")]
    Next {
        /// The selected task.
        task: Box<Task>,
    },
    /// The graph contains no tasks at all.
    Empty,
    /// No task is pending; everything is finished or closed.
    AllComplete,
    /// Pending tasks exist but none is eligible yet.
    #[serde(rename_all = "camelCase")]
    Blocked {
        /// How many pending tasks are waiting on dependencies.
        pending: usize,
    },
}

impl NextOutcome {
    /// The selected task, if any.
    #[must_use]
    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Next { task } => Some(*task),
            _ => None,
        }
    }
}

impl TaskGraph {
    /// Select the next eligible task.
    ///
    /// Candidates are pending tasks/subtasks whose every dependency is
    /// done and whose ancestors are all workable: each ancestor's own
    /// dependencies are done and no ancestor is blocked, deferred,
    /// cancelled, or already done. A subtask may therefore start while
    /// its parent is still pending, but a gated or finished parent
    /// freezes its subtree.
    ///
    /// Order: highest priority first, then ascending id (numeric
    /// per-segment), then depth-first insertion order.
    #[must_use]
    pub fn next_task(&self) -> NextOutcome {
        if self.is_empty() {
            return NextOutcome::Empty;
        }

        let status_of: HashMap<&TaskId, Status> =
            self.flatten().into_iter().map(|t| (&t.id, t.status)).collect();
        let deps_done = |task: &Task| {
            task.dependencies
                .iter()
                .all(|dep| status_of.get(dep).copied() == Some(Status::Done))
        };

        let flat = self.flatten();
        let mut pending = 0usize;
        let mut best: Option<(Reverse<crate::graph::Priority>, &TaskId, usize)> = None;
        let mut best_task: Option<&Task> = None;

        for (index, task) in flat.iter().enumerate() {
            if task.status != Status::Pending {
                continue;
            }
            pending += 1;
            if !deps_done(task) || !self.ancestors_workable(&task.id, &deps_done) {
                continue;
            }
            let key = (Reverse(task.priority), &task.id, index);
            if best.as_ref().map_or(true, |b| key < *b) {
                best = Some(key);
                best_task = Some(task);
            }
        }

        match best_task {
            Some(task) => NextOutcome::Next { task: Box::new(task.clone()) },
            None if pending == 0 => NextOutcome::AllComplete,
            None => NextOutcome::Blocked { pending },
        }
    }

    /// Whether every proper ancestor of `id` allows work in its subtree.
    fn ancestors_workable(&self, id: &TaskId, deps_done: &impl Fn(&Task) -> bool) -> bool {
        let mut current = id.parent();
        while let Some(ancestor_id) = current {
            let Some(ancestor) = self.get(&ancestor_id) else {
                return false;
            };
            if matches!(
                ancestor.status,
                Status::Blocked | Status::Deferred | Status::Cancelled | Status::Done
            ) {
                return false;
            }
            if !deps_done(ancestor) {
                return false;
            }
            current = ancestor_id.parent();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_util::{graph_of, tid};
    use crate::graph::{NewTask, Priority, TaskUpdate};

    #[test]
    fn test_empty_graph() {
        assert_eq!(TaskGraph::new().next_task(), NextOutcome::Empty);
    }

    #[test]
    fn test_all_complete_distinct_from_empty() {
        let mut graph = graph_of(&[("1", &[])]);
        graph.set_status(&tid("1"), Status::Done).unwrap();
        assert_eq!(graph.next_task(), NextOutcome::AllComplete);
    }

    #[test]
    fn test_blocked_reports_pending_count() {
        let mut graph = graph_of(&[("1", &[]), ("2", &["1"]), ("3", &["1"])]);
        graph.set_status(&tid("1"), Status::InProgress).unwrap();
        assert_eq!(graph.next_task(), NextOutcome::Blocked { pending: 2 });
    }

    #[test]
    fn test_dependency_gates_selection() {
        let mut graph = graph_of(&[("1", &[]), ("2", &["1"])]);
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("1"));
        graph.set_status(&tid("1"), Status::Done).unwrap();
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("2"));
    }

    #[test]
    fn test_never_returns_non_pending() {
        let mut graph = graph_of(&[("1", &[]), ("2", &[])]);
        graph.set_status(&tid("1"), Status::Review).unwrap();
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("2"));
    }

    #[test]
    fn test_priority_beats_id_order() {
        let mut graph = graph_of(&[("1", &[]), ("2", &[])]);
        graph
            .update_task(&tid("2"), TaskUpdate { priority: Some(Priority::High), ..TaskUpdate::default() })
            .unwrap();
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("2"));
    }

    #[test]
    fn test_id_order_breaks_priority_ties_numerically() {
        let mut graph = graph_of(&[("1", &[]), ("2", &[])]);
        for _ in 0..8 {
            graph.add_task(NewTask { title: "t".into(), ..NewTask::default() }).unwrap();
        }
        // Ids 1..10 all pending at equal priority: "2" must beat "10".
        graph.set_status(&tid("1"), Status::Done).unwrap();
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("2"));
    }

    #[test]
    fn test_subtask_eligible_while_parent_pending() {
        let graph = graph_of(&[("1.1", &[])]);
        // Parent "1" and subtask "1.1" both pending; the parent wins on
        // id order but the subtask is a legitimate candidate.
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("1"));
    }

    #[test]
    fn test_subtask_selected_when_parent_in_progress() {
        let mut graph = graph_of(&[("1.1", &[])]);
        graph.set_status(&tid("1"), Status::InProgress).unwrap();
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("1.1"));
    }

    #[test]
    fn test_deferred_parent_freezes_subtree() {
        let mut graph = graph_of(&[("1.1", &[]), ("2", &[])]);
        graph.set_status(&tid("1"), Status::Deferred).unwrap();
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("2"));
    }

    #[test]
    fn test_parent_unmet_dependencies_gate_subtasks() {
        let mut graph = graph_of(&[("1", &[]), ("2.1", &[])]);
        graph.add_dependency(&tid("2"), &tid("1")).unwrap();
        graph.set_status(&tid("2"), Status::InProgress).unwrap();
        // "2.1" is pending with no deps of its own, but its parent still
        // waits on "1", so only "1" is eligible.
        assert_eq!(graph.next_task().into_task().unwrap().id, tid("1"));
    }

    #[test]
    fn test_unresolvable_dependency_blocks_candidate() {
        let mut graph = graph_of(&[("1", &[]), ("2", &["1"])]);
        // Simulate a dangling edge left by an out-of-band edit.
        graph.get_mut(&tid("2")).unwrap().dependencies = vec![tid("9")];
        graph.set_status(&tid("1"), Status::Done).unwrap();
        assert_eq!(graph.next_task(), NextOutcome::Blocked { pending: 1 });
    }
}
