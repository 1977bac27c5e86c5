//! Hierarchical task identifiers.
//!
//! Task ids use dotted notation: a top-level task is a single number
//! ("5"), a subtask appends its sequence to the parent id ("5.2"), and
//! nesting recurses ("5.2.1"). Ids compare numerically per segment, so
//! "10" sorts after "2" and a parent sorts before its subtasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed hierarchical task id.
///
/// Internally a non-empty list of sequence numbers, one per nesting
/// level. Segments are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(Vec<u64>);

impl TaskId {
    /// Create a top-level id from a single sequence number.
    ///
    /// # Panics
    ///
    /// Panics if `seq` is zero; sequences are 1-based.
    #[must_use]
    pub fn root(seq: u64) -> Self {
        assert!(seq > 0, "task sequences are 1-based");
        Self(vec![seq])
    }

    /// Compose a child id from a parent id and a sequence number.
    #[must_use]
    pub fn child(&self, seq: u64) -> Self {
        let mut segments = self.0.clone();
        segments.push(seq);
        Self(segments)
    }

    /// The parent id, or `None` for a top-level id.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() > 1 {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    /// Nesting depth: 1 for a top-level task, 2 for its subtasks, and so on.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The id truncated to the first `depth` segments.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is zero or exceeds this id's depth.
    #[must_use]
    pub fn truncate(&self, depth: usize) -> Self {
        assert!(depth >= 1 && depth <= self.0.len(), "depth out of range");
        Self(self.0[..depth].to_vec())
    }

    /// The final sequence number (position among siblings).
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        *self.0.last().unwrap_or(&0)
    }

    /// The id segments.
    #[must_use]
    pub fn segments(&self) -> &[u64] {
        &self.0
    }

    /// Whether this id lies strictly inside `ancestor`'s subtree.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }

    /// Whether `s` parses as a valid task id.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Self>().is_ok()
    }

    /// Rewrite this id by replacing the `old_prefix` segments with
    /// `new_prefix`, keeping the remaining tail.
    ///
    /// Used when a subtree moves: every id inside the subtree is rebased
    /// onto the subtree root's new id. Returns `None` if this id is not
    /// `old_prefix` or one of its descendants.
    #[must_use]
    pub fn rebase(&self, old_prefix: &Self, new_prefix: &Self) -> Option<Self> {
        if self == old_prefix || self.is_descendant_of(old_prefix) {
            let mut segments = new_prefix.0.clone();
            segments.extend_from_slice(&self.0[old_prefix.0.len()..]);
            Some(Self(segments))
        } else {
            None
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{seg}")?;
            first = false;
        }
        Ok(())
    }
}

/// Error when a task id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{input}': {reason}")]
pub struct ParseTaskIdError {
    /// The rejected input.
    pub input: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ParseTaskIdError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self { input: input.to_string(), reason }
    }
}

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseTaskIdError::new(s, "id must not be empty"));
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(ParseTaskIdError::new(s, "empty segment"));
            }
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseTaskIdError::new(s, "segments must be numeric"));
            }
            let seq: u64 = part
                .parse()
                .map_err(|_| ParseTaskIdError::new(s, "segment out of range"))?;
            if seq == 0 {
                return Err(ParseTaskIdError::new(s, "segments are 1-based"));
            }
            segments.push(seq);
        }
        Ok(Self(segments))
    }
}

impl TryFrom<String> for TaskId {
    type Error = ParseTaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}
