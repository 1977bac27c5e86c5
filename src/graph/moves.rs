//! Subtree move and renumber.
//!
//! Moving a task remaps its own id and every descendant's id onto the
//! destination, then rewrites every dependency entry anywhere in the
//! graph that pointed into the moved subtree. The report names every
//! renumbered id and every rewritten edge.

use crate::error::{Error, Result};
use crate::graph::id::TaskId;
use crate::graph::{Task, TaskGraph};
use serde::Serialize;

/// What to do when the destination id is already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Fail with [`Error::MoveConflict`]; never overwrite.
    #[default]
    Fail,
    /// Synthesize the next free sibling sequence at the destination
    /// parent and report which id was chosen.
    Placeholder,
}

/// Options for [`TaskGraph::move_task`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOptions {
    /// Conflict handling when the destination id exists.
    pub on_conflict: ConflictPolicy,
}

/// A rewritten dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyUpdate {
    /// The task holding the edge (post-move id).
    pub task: TaskId,
    /// The dependency id before the move.
    pub old: TaskId,
    /// The dependency id after the move.
    pub new: TaskId,
}

/// Everything a move changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReport {
    /// The subtree root's id after the move. Differs from the requested
    /// destination only under [`ConflictPolicy::Placeholder`].
    pub new_id: TaskId,
    /// Every `(old, new)` id pair in the moved subtree, root first.
    pub renumbered: Vec<(TaskId, TaskId)>,
    /// Every dependency edge rewritten because its target moved.
    pub dependency_updates: Vec<DependencyUpdate>,
}

impl TaskGraph {
    /// Move the subtree rooted at `from` so its root becomes `to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `from` or the destination parent
    /// does not exist, [`Error::InvalidReference`] if the destination
    /// lies inside the subtree being moved, or [`Error::MoveConflict`]
    /// if `to` is occupied and the policy is [`ConflictPolicy::Fail`].
    pub fn move_task(&mut self, from: &TaskId, to: &TaskId, options: MoveOptions) -> Result<MoveReport> {
        if !self.contains(from) {
            return Err(Error::NotFound(from.to_string()));
        }
        if to == from || to.is_descendant_of(from) {
            return Err(Error::InvalidReference {
                from: from.to_string(),
                to: to.to_string(),
                reason: "destination lies inside the subtree being moved".to_string(),
            });
        }
        let dest_parent = to.parent();
        if let Some(parent) = &dest_parent {
            if !self.contains(parent) {
                return Err(Error::NotFound(parent.to_string()));
            }
        }

        let actual_to = if self.contains(to) {
            match options.on_conflict {
                ConflictPolicy::Fail => return Err(Error::MoveConflict(to.to_string())),
                ConflictPolicy::Placeholder => {
                    let seq = self.next_seq(dest_parent.as_ref());
                    dest_parent.as_ref().map_or_else(|| TaskId::root(seq), |p| p.child(seq))
                }
            }
        } else {
            to.clone()
        };

        // Detach the subtree.
        let source_siblings = self
            .siblings_mut(from.parent().as_ref())
            .ok_or_else(|| Error::NotFound(from.to_string()))?;
        let pos = source_siblings
            .iter()
            .position(|t| t.id == *from)
            .ok_or_else(|| Error::NotFound(from.to_string()))?;
        let mut subtree = source_siblings.remove(pos);
        let descendant_count = subtree.descendant_count();

        // Renumber the subtree onto its new root id.
        let mut renumbered = Vec::with_capacity(descendant_count + 1);
        renumber(&mut subtree, from, &actual_to, &mut renumbered);

        // Reattach at the destination.
        let now = super::now_iso();
        subtree.updated_at = now.clone();
        match self.siblings_mut(dest_parent.as_ref()) {
            Some(siblings) => siblings.push(subtree),
            None => return Err(Error::NotFound(actual_to.to_string())),
        }

        // Rewrite dependency edges that pointed into the moved subtree.
        let mut dependency_updates = Vec::new();
        remap_dependencies(&mut self.tasks, from, &actual_to, &now, &mut dependency_updates);

        debug_assert_eq!(
            self.get(&actual_to).map(Task::descendant_count),
            Some(descendant_count),
            "move must preserve descendant count"
        );

        Ok(MoveReport { new_id: actual_to, renumbered, dependency_updates })
    }
}

/// Rewrite the subtree's ids onto `new_prefix`, collecting `(old, new)`
/// pairs in depth-first order.
fn renumber(task: &mut Task, old_prefix: &TaskId, new_prefix: &TaskId, out: &mut Vec<(TaskId, TaskId)>) {
    if let Some(new_id) = task.id.rebase(old_prefix, new_prefix) {
        out.push((task.id.clone(), new_id.clone()));
        task.id = new_id;
    }
    for sub in &mut task.subtasks {
        renumber(sub, old_prefix, new_prefix, out);
    }
}

/// Rewrite every dependency entry that rebases under the move.
fn remap_dependencies(
    tasks: &mut [Task],
    old_prefix: &TaskId,
    new_prefix: &TaskId,
    now: &str,
    out: &mut Vec<DependencyUpdate>,
) {
    for task in tasks {
        let mut touched = false;
        for dep in &mut task.dependencies {
            if let Some(new_dep) = dep.rebase(old_prefix, new_prefix) {
                out.push(DependencyUpdate { task: task.id.clone(), old: dep.clone(), new: new_dep.clone() });
                *dep = new_dep;
                touched = true;
            }
        }
        if touched {
            task.updated_at = now.to_string();
        }
        remap_dependencies(&mut task.subtasks, old_prefix, new_prefix, now, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_util::{graph_of, tid};

    #[test]
    fn test_move_subtree_renumbers_descendants() {
        // Move "5.2" with children 5.2.1 and 5.2.2 onto the free id "7".
        let mut graph = graph_of(&[("5.2.1", &[]), ("5.2.2", &[]), ("6", &[])]);
        let report = graph.move_task(&tid("5.2"), &tid("7"), MoveOptions::default()).unwrap();

        assert_eq!(report.new_id, tid("7"));
        assert_eq!(
            report.renumbered,
            vec![(tid("5.2"), tid("7")), (tid("5.2.1"), tid("7.1")), (tid("5.2.2"), tid("7.2"))]
        );
        assert!(graph.contains(&tid("7")));
        assert!(graph.contains(&tid("7.1")));
        assert!(graph.contains(&tid("7.2")));
        assert!(!graph.contains(&tid("5.2")));
        assert_eq!(graph.get(&tid("7")).unwrap().descendant_count(), 2);
    }

    #[test]
    fn test_move_remaps_external_dependencies() {
        let mut graph = graph_of(&[("5.2.1", &[]), ("6", &["5.2"]), ("6.1", &["5.2.1"])]);
        let report = graph.move_task(&tid("5.2"), &tid("7"), MoveOptions::default()).unwrap();

        assert_eq!(graph.get(&tid("6")).unwrap().dependencies, vec![tid("7")]);
        assert_eq!(graph.get(&tid("6.1")).unwrap().dependencies, vec![tid("7.1")]);
        assert_eq!(report.dependency_updates.len(), 2);
        assert!(report
            .dependency_updates
            .contains(&DependencyUpdate { task: tid("6"), old: tid("5.2"), new: tid("7") }));
        assert!(report
            .dependency_updates
            .contains(&DependencyUpdate { task: tid("6.1"), old: tid("5.2.1"), new: tid("7.1") }));
    }

    #[test]
    fn test_move_remaps_internal_dependencies() {
        let mut graph = graph_of(&[("5.2.1", &[]), ("5.2.2", &["5.2.1"])]);
        graph.move_task(&tid("5.2"), &tid("7"), MoveOptions::default()).unwrap();
        assert_eq!(graph.get(&tid("7.2")).unwrap().dependencies, vec![tid("7.1")]);
    }

    #[test]
    fn test_move_into_subtask_position() {
        let mut graph = graph_of(&[("1", &[]), ("2", &[])]);
        let report = graph.move_task(&tid("2"), &tid("1.1"), MoveOptions::default()).unwrap();
        assert_eq!(report.new_id, tid("1.1"));
        assert_eq!(graph.get(&tid("1")).unwrap().subtasks.len(), 1);
        assert!(!graph.contains(&tid("2")));
    }

    #[test]
    fn test_move_conflict_fails_explicitly() {
        let mut graph = graph_of(&[("1", &[]), ("2", &[])]);
        let err = graph.move_task(&tid("1"), &tid("2"), MoveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MoveConflict(id) if id == "2"));
        // Nothing moved.
        assert!(graph.contains(&tid("1")));
    }

    #[test]
    fn test_move_conflict_placeholder_reports_chosen_id() {
        let mut graph = graph_of(&[("1", &[]), ("2", &[]), ("3", &[])]);
        let report = graph
            .move_task(&tid("1"), &tid("2"), MoveOptions { on_conflict: ConflictPolicy::Placeholder })
            .unwrap();
        assert_eq!(report.new_id, tid("4"));
        assert!(graph.contains(&tid("4")));
        assert!(!graph.contains(&tid("1")));
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut graph = graph_of(&[("1.1", &[])]);
        let err = graph.move_task(&tid("1"), &tid("1.1.1"), MoveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));
        let err = graph.move_task(&tid("1"), &tid("1"), MoveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));
    }

    #[test]
    fn test_move_to_missing_parent_rejected() {
        let mut graph = graph_of(&[("1", &[])]);
        let err = graph.move_task(&tid("1"), &tid("9.1"), MoveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "9"));
    }

    #[test]
    fn test_move_missing_source_rejected() {
        let mut graph = graph_of(&[("1", &[])]);
        let err = graph.move_task(&tid("8"), &tid("9"), MoveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "8"));
    }

    #[test]
    fn test_moved_graph_stays_valid() {
        let mut graph = graph_of(&[("5.2.1", &[]), ("6", &["5.2.1"]), ("8", &["6"])]);
        graph.move_task(&tid("5.2"), &tid("7"), MoveOptions::default()).unwrap();
        assert!(graph.validate_dependencies().is_empty());
    }
}
