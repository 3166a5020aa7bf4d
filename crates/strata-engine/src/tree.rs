//! Tree checkpoint manager: environment-wide snapshots anchored at the root.

use std::collections::HashMap;

use tracing::{info, warn};

use strata_storage::types::*;
use strata_storage::PitStore;

use crate::{EngineError, PitEngine};

impl<S: PitStore> PitEngine<S> {
    /// Snapshot an environment at one of its root folder's commits.
    ///
    /// Covers every live non-reserved folder that existed when the anchor
    /// commit was made; each gets exactly one coverage row pointing at its
    /// latest commit with seq not after the anchor, or at no commit if it
    /// had none yet.
    pub async fn create_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
        root_commit_id: &CommitId,
    ) -> Result<TreeCheckpoint, EngineError> {
        let env = self.store().get_environment(env_id).await?;
        let commit = self.store().get_commit(root_commit_id).await?;
        let anchor_folder = self.store().get_folder(&commit.folder_id).await?;
        if anchor_folder.environment_id != env.id || anchor_folder.parent_id.is_some() {
            return Err(EngineError::NotRootCommit(commit.id));
        }

        let folders = self.store().list_folders_by_env(&env.id).await?;
        let covered: Vec<&Folder> = folders
            .iter()
            .filter(|f| !f.is_reserved && f.created_at <= commit.created_at)
            .collect();
        let covered_ids: Vec<FolderId> = covered.iter().map(|f| f.id).collect();

        let latest = self
            .store()
            .latest_commits_for_folders(&covered_ids, Some(commit.seq))
            .await?;
        let by_folder: HashMap<FolderId, CommitId> =
            latest.into_iter().map(|c| (c.folder_id, c.id)).collect();

        let resources: Vec<TreeCheckpointResource> = covered
            .iter()
            .map(|f| TreeCheckpointResource {
                folder_id: f.id,
                commit_id: by_folder.get(&f.id).copied(),
            })
            .collect();

        let tree_checkpoint = self
            .store()
            .create_tree_checkpoint(&CreateTreeCheckpointParams {
                commit_id: commit.id,
                resources,
            })
            .await?;
        info!(
            environment = %env.id.0,
            commit = %commit.id.0,
            folders = covered_ids.len(),
            "tree checkpoint created"
        );
        Ok(tree_checkpoint)
    }

    /// Take a tree checkpoint at the root folder's latest commit once enough
    /// environment commits accumulated since the last one.
    pub async fn maybe_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Option<TreeCheckpoint>, EngineError> {
        let folders = self.store().list_folders_by_env(env_id).await?;
        let Some(root) = folders
            .iter()
            .find(|f| f.parent_id.is_none() && !f.is_reserved)
        else {
            warn!(environment = %env_id.0, "environment has no root folder");
            return Ok(None);
        };
        let Some(root_commit) = self.store().latest_commit(&root.id).await? else {
            return Ok(None);
        };
        let since = match self.store().latest_tree_checkpoint(env_id).await? {
            Some(tree_checkpoint) => {
                if tree_checkpoint.commit_id == root_commit.id {
                    return Ok(None);
                }
                self.store()
                    .count_env_commits_after(env_id, tree_checkpoint.commit_seq)
                    .await?
            }
            None => self.store().count_env_commits_after(env_id, 0).await?,
        };
        if since < self.config().tree_checkpoint_window {
            return Ok(None);
        }
        self.create_tree_checkpoint(env_id, &root_commit.id)
            .await
            .map(Some)
    }

    /// The environment's newest tree checkpoint, if any.
    pub async fn latest_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Option<TreeCheckpoint>, EngineError> {
        Ok(self.store().latest_tree_checkpoint(env_id).await?)
    }
}
