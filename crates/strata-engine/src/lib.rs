//! Point-in-time versioning engine over a [`PitStore`] backend.
//!
//! The engine is read/append only with respect to resource tables: folders
//! and secrets are mutated by their owning CRUD layer, which then records
//! commits here. Reconstruction never writes.

use std::sync::Arc;

use thiserror::Error;

use strata_storage::types::{CommitId, FolderId, ResourceKey, VersionRef};
use strata_storage::{PitStore, StoreError};

pub mod backfill;
mod checkpoint;
mod commit;
mod diff;
mod reconstruct;
mod tree;

pub use backfill::{BackfillConfig, BackfillReport, TraversalOrder, BACKFILL_MESSAGE};
pub use commit::{CommitDetails, CommitParams};
pub use diff::{DiffOp, StateDiff};
pub use reconstruct::{CommitRef, FolderTreeState};

/// Operational thresholds. Correctness never depends on these; they only
/// bound replay length.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Commits since the last checkpoint before a new one is taken.
    pub checkpoint_window: u64,
    /// Environment commits since the last tree checkpoint before a new one
    /// is taken.
    pub tree_checkpoint_window: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            checkpoint_window: 2,
            tree_checkpoint_window: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("commit carries no changes")]
    EmptyChangeSet,
    #[error("multiple non-delete changes for resource {0:?}")]
    DuplicateResource(ResourceKey),
    #[error("unknown version reference {0:?}")]
    UnknownVersion(VersionRef),
    #[error("commit {0:?} does not belong to folder {1:?}")]
    CommitFolderMismatch(CommitId, FolderId),
    #[error("commit {0:?} is not a commit of the environment root folder")]
    NotRootCommit(CommitId),
    #[error("folder {0:?} is reserved and not versioned")]
    ReservedFolder(FolderId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The versioning engine. Generic over the storage backend.
pub struct PitEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: PitStore> PitEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        PitEngine { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
