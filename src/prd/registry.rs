//! PRD registry and content-hash change detection.

use crate::error::{Error, Result};
use crate::graph::{TaskGraph, TaskId};
use crate::prd::models::{Prd, PrdStatus};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hash a file's content, returning `(lowercase hex SHA-256, size)`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<(String, u64)> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok((hex::encode(digest), bytes.len() as u64))
}

/// How a tracked PRD file compares to its recorded baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Content hash matches the baseline.
    Unmodified,
    /// Content hash differs from the baseline.
    Modified,
    /// The recorded path no longer exists.
    Missing,
}

/// One entry of a change-detection report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdChange {
    /// The PRD's identifier.
    pub prd_identifier: String,
    /// The drift classification.
    pub classification: ChangeKind,
    /// Ids of top-level tasks generated from this PRD.
    pub affected_task_ids: Vec<TaskId>,
}

/// In-memory PRD registry: one record per tracked PRD file.
///
/// Owned exclusively for the duration of one command invocation;
/// persistence goes through [`crate::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrdRegistry {
    prds: Vec<Prd>,
}

impl PrdRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { prds: Vec::new() }
    }

    /// Build a registry from deserialized records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if two records share an identifier.
    pub fn from_prds(prds: Vec<Prd>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for prd in &prds {
            if !seen.insert(&prd.prd_identifier) {
                return Err(Error::DuplicateId(prd.prd_identifier.clone()));
            }
        }
        Ok(Self { prds })
    }

    /// The tracked records, in registration order.
    #[must_use]
    pub fn prds(&self) -> &[Prd] {
        &self.prds
    }

    /// Consume the registry, yielding records for serialization.
    #[must_use]
    pub fn into_prds(self) -> Vec<Prd> {
        self.prds
    }

    /// Look up a record by identifier.
    #[must_use]
    pub fn get(&self, prd_identifier: &str) -> Option<&Prd> {
        self.prds.iter().find(|p| p.prd_identifier == prd_identifier)
    }

    /// Look up a record by identifier, mutably.
    pub(crate) fn get_mut(&mut self, prd_identifier: &str) -> Option<&mut Prd> {
        self.prds.iter_mut().find(|p| p.prd_identifier == prd_identifier)
    }

    /// Register an already-built record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the identifier is taken.
    pub fn register(&mut self, prd: Prd) -> Result<()> {
        if self.get(&prd.prd_identifier).is_some() {
            return Err(Error::DuplicateId(prd.prd_identifier));
        }
        self.prds.push(prd);
        Ok(())
    }

    /// Start tracking a PRD file: hash it and register a pending record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the identifier is taken, or an
    /// I/O error if the file cannot be read.
    pub fn track(&mut self, prd_identifier: &str, file_path: &Path) -> Result<Prd> {
        if self.get(prd_identifier).is_some() {
            return Err(Error::DuplicateId(prd_identifier.to_string()));
        }
        let (file_hash, file_size) = hash_file(file_path)?;
        let now = crate::graph::now_iso();
        let prd = Prd {
            prd_identifier: prd_identifier.to_string(),
            file_path: file_path.to_string_lossy().into_owned(),
            file_name: file_path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
            file_hash,
            file_size,
            status: PrdStatus::Pending,
            parsed_date: now.clone(),
            last_modified: now,
        };
        self.prds.push(prd.clone());
        Ok(prd)
    }

    /// Remove a record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PrdNotFound`] if the identifier is unknown.
    pub fn remove(&mut self, prd_identifier: &str) -> Result<Prd> {
        let pos = self
            .prds
            .iter()
            .position(|p| p.prd_identifier == prd_identifier)
            .ok_or_else(|| Error::PrdNotFound(prd_identifier.to_string()))?;
        Ok(self.prds.remove(pos))
    }

    /// Detect drift for every tracked, non-archived PRD.
    ///
    /// Re-hashes each file and classifies it against the stored
    /// baseline. `affected_task_ids` names the top-level tasks whose
    /// provenance matches the PRD's recorded path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing file cannot be read.
    pub fn check_changes(&self, graph: &TaskGraph) -> Result<Vec<PrdChange>> {
        let mut changes = Vec::new();
        for prd in &self.prds {
            if prd.status == PrdStatus::Archived {
                continue;
            }
            let path = Path::new(&prd.file_path);
            let classification = if path.exists() {
                let (hash, _) = hash_file(path)?;
                if hash == prd.file_hash { ChangeKind::Unmodified } else { ChangeKind::Modified }
            } else {
                ChangeKind::Missing
            };
            let affected_task_ids =
                graph.tasks_for_prd(&prd.file_path).iter().map(|t| t.id.clone()).collect();
            changes.push(PrdChange {
                prd_identifier: prd.prd_identifier.clone(),
                classification,
                affected_task_ids,
            });
        }
        Ok(changes)
    }

    /// Reset a PRD's drift baseline: re-hash and store the new hash,
    /// size, and timestamp. Never touches any generated task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PrdNotFound`] if the identifier is unknown, or
    /// an I/O error if the file cannot be read.
    pub fn update_metadata(&mut self, prd_identifier: &str) -> Result<Prd> {
        let prd = self
            .get(prd_identifier)
            .ok_or_else(|| Error::PrdNotFound(prd_identifier.to_string()))?;
        let (file_hash, file_size) = hash_file(Path::new(&prd.file_path))?;
        let now = crate::graph::now_iso();

        // Re-borrow mutably only after hashing succeeded.
        let prd = self
            .get_mut(prd_identifier)
            .ok_or_else(|| Error::PrdNotFound(prd_identifier.to_string()))?;
        prd.file_hash = file_hash;
        prd.file_size = file_size;
        prd.last_modified = now;
        Ok(prd.clone())
    }
}
