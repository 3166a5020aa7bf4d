//! State reconstruction: nearest checkpoint plus ordered replay.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use strata_storage::types::*;
use strata_storage::PitStore;

use crate::{EngineError, PitEngine};

/// Reconstruction target: an exact commit or a wall-clock instant.
#[derive(Clone, Copy, Debug)]
pub enum CommitRef {
    Id(CommitId),
    At(DateTime<Utc>),
}

/// One folder's resolved state within a tree reconstruction.
#[derive(Clone, Debug)]
pub struct FolderTreeState {
    pub folder_id: FolderId,
    /// Commit the state was resolved at; `None` for a folder with no
    /// commits at the target instant (legitimately empty).
    pub commit_id: Option<CommitId>,
    pub resources: Vec<ResourceState>,
}

impl<S: PitStore> PitEngine<S> {
    /// Resolve a folder's full resource set as of `target`.
    ///
    /// Loads the nearest checkpoint at or before the target commit (empty
    /// base when none exists) and replays later changes in seq order:
    /// Add/Update upsert by resource identity, Delete removes. Read-only and
    /// deterministic; a folder with no commits resolves to the empty set.
    pub async fn resolve_folder(
        &self,
        folder_id: &FolderId,
        target: CommitRef,
    ) -> Result<Vec<ResourceState>, EngineError> {
        let target_commit = match target {
            CommitRef::Id(id) => {
                let commit = self.store().get_commit(&id).await?;
                if commit.folder_id != *folder_id {
                    return Err(EngineError::CommitFolderMismatch(commit.id, *folder_id));
                }
                Some(commit)
            }
            CommitRef::At(at) => self.store().commit_at_or_before(folder_id, at).await?,
        };
        let Some(target_commit) = target_commit else {
            return Ok(Vec::new());
        };

        let mut state: BTreeMap<ResourceKey, ResourceState> = BTreeMap::new();
        let after_seq = match self
            .store()
            .nearest_checkpoint(folder_id, target_commit.seq)
            .await?
        {
            Some(checkpoint) => {
                for resource in self.store().checkpoint_resources(&checkpoint.id).await? {
                    state.insert(resource.identity(), resource);
                }
                checkpoint.commit_seq
            }
            None => 0,
        };

        if after_seq < target_commit.seq {
            let records = self
                .store()
                .changes_between(folder_id, after_seq, target_commit.seq)
                .await?;
            for record in records {
                match record.op {
                    ChangeOp::Add | ChangeOp::Update => {
                        state.insert(record.state.identity(), record.state);
                    }
                    ChangeOp::Delete => {
                        state.remove(&record.state.identity());
                    }
                }
            }
        }
        Ok(state.into_values().collect())
    }

    /// Resolve every folder of an environment as of instant `at`.
    ///
    /// Starts from the nearest tree checkpoint (coverage rows), advances each
    /// folder to its latest commit not after `at`, and merges in folders
    /// whose first commit landed after the tree checkpoint.
    ///
    /// The folder set is what history records, not the live table: a folder
    /// with no commits of its own shows up (empty, with no commit) once a
    /// tree checkpoint covers it, and not before. Before the environment's
    /// first tree checkpoint only folders with commits are returned.
    pub async fn resolve_tree(
        &self,
        env_id: &EnvironmentId,
        at: DateTime<Utc>,
    ) -> Result<Vec<FolderTreeState>, EngineError> {
        let env = self.store().get_environment(env_id).await?;

        let mut anchors: BTreeMap<FolderId, Option<CommitId>> = BTreeMap::new();
        let after_seq = match self.store().nearest_tree_checkpoint(&env.id, at).await? {
            Some(tree_checkpoint) => {
                for row in self
                    .store()
                    .tree_checkpoint_resources(&tree_checkpoint.id)
                    .await?
                {
                    anchors.insert(row.folder_id, row.commit_id);
                }
                tree_checkpoint.commit_seq
            }
            None => 0,
        };

        for commit in self
            .store()
            .latest_commits_between(&env.id, after_seq, at)
            .await?
        {
            anchors.insert(commit.folder_id, Some(commit.id));
        }

        let mut out = Vec::with_capacity(anchors.len());
        for (folder_id, commit_id) in anchors {
            let resources = match commit_id {
                Some(commit_id) => {
                    self.resolve_folder(&folder_id, CommitRef::Id(commit_id))
                        .await?
                }
                None => Vec::new(),
            };
            out.push(FolderTreeState {
                folder_id,
                commit_id,
                resources,
            });
        }
        Ok(out)
    }
}
