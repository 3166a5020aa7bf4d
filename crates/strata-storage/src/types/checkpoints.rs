//! Checkpoint and tree checkpoint types.

use chrono::{DateTime, Utc};

use super::{CheckpointId, CommitId, EnvironmentId, FolderId, TreeCheckpointId, VersionRef};

/// Materialized folder state anchored at one commit (1:1 with the commit).
#[derive(Clone, Debug)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub folder_id: FolderId,
    pub commit_id: CommitId,
    /// Seq of the anchoring commit, joined in on read.
    pub commit_seq: i64,
    pub created_at: DateTime<Utc>,
}

/// Parameters for persisting a checkpoint with its resource set
#[derive(Clone, Debug)]
pub struct CreateCheckpointParams {
    pub commit_id: CommitId,
    pub resources: Vec<VersionRef>,
}

/// Environment-wide snapshot anchored at a root folder commit.
#[derive(Clone, Debug)]
pub struct TreeCheckpoint {
    pub id: TreeCheckpointId,
    pub environment_id: EnvironmentId,
    pub commit_id: CommitId,
    pub commit_seq: i64,
    pub created_at: DateTime<Utc>,
}

/// One covered folder within a tree checkpoint.
///
/// `commit_id` is `None` for a folder that existed at the snapshot but had no
/// commits yet; the folder is still covered, with an empty state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeCheckpointResource {
    pub folder_id: FolderId,
    pub commit_id: Option<CommitId>,
}

/// Parameters for persisting a tree checkpoint with its coverage rows
#[derive(Clone, Debug)]
pub struct CreateTreeCheckpointParams {
    pub commit_id: CommitId,
    pub resources: Vec<TreeCheckpointResource>,
}
