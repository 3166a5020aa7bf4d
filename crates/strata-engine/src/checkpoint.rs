//! Checkpoint manager: window-based materialization of folder state.

use tracing::info;

use strata_storage::types::*;
use strata_storage::PitStore;

use crate::{CommitRef, EngineError, PitEngine};

impl<S: PitStore> PitEngine<S> {
    /// Materialize the folder's state at `at_commit_id` as a checkpoint.
    pub async fn create_checkpoint(
        &self,
        folder_id: &FolderId,
        at_commit_id: &CommitId,
    ) -> Result<Checkpoint, EngineError> {
        let commit = self.store().get_commit(at_commit_id).await?;
        if commit.folder_id != *folder_id {
            return Err(EngineError::CommitFolderMismatch(commit.id, *folder_id));
        }
        let state = self
            .resolve_folder(folder_id, CommitRef::Id(commit.id))
            .await?;
        let resources = state.iter().map(ResourceState::version_ref).collect();
        let checkpoint = self
            .store()
            .create_checkpoint(&CreateCheckpointParams {
                commit_id: commit.id,
                resources,
            })
            .await?;
        info!(
            folder = %folder_id.0,
            commit = %commit.id.0,
            resources = state.len(),
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// Take a checkpoint at the folder's latest commit once enough commits
    /// accumulated since the last one. Returns `None` when below the window.
    pub async fn maybe_checkpoint(
        &self,
        folder_id: &FolderId,
    ) -> Result<Option<Checkpoint>, EngineError> {
        let Some(latest) = self.store().latest_commit(folder_id).await? else {
            return Ok(None);
        };
        let since = match self.store().latest_checkpoint(folder_id).await? {
            Some(checkpoint) => {
                if checkpoint.commit_id == latest.id {
                    return Ok(None);
                }
                self.store()
                    .count_commits_after(folder_id, checkpoint.commit_seq)
                    .await?
            }
            None => self.store().count_commits_after(folder_id, 0).await?,
        };
        if since < self.config().checkpoint_window {
            return Ok(None);
        }
        self.create_checkpoint(folder_id, &latest.id).await.map(Some)
    }

    /// The folder's newest checkpoint, if any.
    pub async fn latest_checkpoint(
        &self,
        folder_id: &FolderId,
    ) -> Result<Option<Checkpoint>, EngineError> {
        Ok(self.store().latest_checkpoint(folder_id).await?)
    }

    /// Checkpoints of a folder, newest first.
    pub async fn checkpoints_for_folder(
        &self,
        folder_id: &FolderId,
        limit: Option<u32>,
    ) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.store().checkpoints_for_folder(folder_id, limit).await?)
    }
}
