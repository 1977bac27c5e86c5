//! # `prdflow`
//!
//! Task dependency graph engine with PRD lifecycle synchronization.
//!
//! Tasks form a tree addressed by dotted ids (`"3"`, `"3.2"`, `"3.2.1"`)
//! with cross-tree dependency edges, validated and repaired by the graph
//! layer. PRD files are tracked in a registry with content-hash drift
//! detection, and their lifecycle status is derived from the tasks they
//! generated, relocating each file between `pending/`, `in-progress/`,
//! `done/`, and `archived/` directories as work progresses.
//!
//! [`ops::Workspace`] is the entry point: every operation is one
//! advisory-locked load→mutate→persist cycle over the JSON snapshots.

pub mod config;
pub mod error;
pub mod graph;
pub mod ops;
pub mod prd;
pub mod snapshot;

pub use error::{Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
