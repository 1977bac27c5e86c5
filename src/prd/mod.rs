//! PRD registry, change detection, and lifecycle synchronization.
//!
//! The registry tracks one record per PRD file with a content-hash
//! drift baseline. The sync engine derives each PRD's status from its
//! linked tasks and relocates files between the lifecycle directories
//! (`pending/`, `in-progress/`, `done/`, `archived/`). A relocation
//! rewrites the linked tasks' provenance paths in the same step, so the
//! record and its tasks always name the same file.

pub mod models;
pub mod registry;
pub mod sync;

pub use models::{InvalidPrdStatus, Prd, PrdDirs, PrdStatus};
pub use registry::{hash_file, ChangeKind, PrdChange, PrdRegistry};
pub use sync::{
    apply_sync, derive_status, plan_archive, plan_sync, FsPrdFileOps, PrdFileOps, PrdTransition,
    Relocation, SyncPlan, SyncReport, SyncTarget,
};
