//! The PitStore trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait the versioning engine depends on.
///
/// Resource tables (projects, environments, folders, secrets and their
/// version rows) are owned by the CRUD layer; the engine only reads them.
/// Their write surface is exposed here so hosts and tests can seed state
/// through the same trait.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait PitStore: Send + Sync {
    // ───────────────────────────────────── Projects / Environments ────────────────────────

    /// Create a project (returns generated ID).
    async fn create_project(&self, params: &CreateProjectParams) -> Result<ProjectId, StoreError>;

    /// Create an environment under a project.
    async fn create_environment(
        &self,
        params: &CreateEnvironmentParams,
    ) -> Result<EnvironmentId, StoreError>;

    /// Get environment by ID.
    async fn get_environment(&self, env_id: &EnvironmentId) -> Result<Environment, StoreError>;

    /// List all project IDs, oldest first.
    async fn list_project_ids(&self) -> Result<Vec<ProjectId>, StoreError>;

    // ───────────────────────────────────── Folders ─────────────────────────────────────────

    /// Create a folder at version 1 together with its first version row.
    async fn create_folder(
        &self,
        params: &CreateFolderParams,
    ) -> Result<(FolderId, FolderVersionId), StoreError>;

    /// Mutate a folder, bump its version counter, and write the version row.
    async fn update_folder(&self, params: &UpdateFolderParams)
        -> Result<FolderVersionId, StoreError>;

    /// Delete a folder row. Version rows persist.
    async fn delete_folder(&self, folder_id: &FolderId) -> Result<(), StoreError>;

    /// Get folder by ID.
    async fn get_folder(&self, folder_id: &FolderId) -> Result<Folder, StoreError>;

    /// List live folders in an environment.
    async fn list_folders_by_env(&self, env_id: &EnvironmentId)
        -> Result<Vec<Folder>, StoreError>;

    /// List live folders across environments of the given projects.
    async fn list_folders_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Folder>, StoreError>;

    /// Latest version row per given folder.
    async fn latest_folder_versions(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<FolderVersion>, StoreError>;

    /// Map version rows back to their owning folders. Unknown IDs are omitted.
    async fn folder_version_owners(
        &self,
        version_ids: &[FolderVersionId],
    ) -> Result<Vec<(FolderVersionId, FolderId)>, StoreError>;

    // ───────────────────────────────────── Secrets ─────────────────────────────────────────

    /// Create a secret at version 1 together with its first version row.
    async fn create_secret(
        &self,
        params: &CreateSecretParams,
    ) -> Result<(SecretId, SecretVersionId), StoreError>;

    /// Mutate a secret, bump its version counter, and write the version row.
    async fn update_secret(&self, params: &UpdateSecretParams)
        -> Result<SecretVersionId, StoreError>;

    /// Delete a secret row. Version rows persist.
    async fn delete_secret(&self, secret_id: &SecretId) -> Result<(), StoreError>;

    /// Latest version row per live secret directly under the given folders.
    async fn latest_secret_versions(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<SecretVersion>, StoreError>;

    /// Map version rows back to their owning secrets. Unknown IDs are omitted.
    async fn secret_version_owners(
        &self,
        version_ids: &[SecretVersionId],
    ) -> Result<Vec<(SecretVersionId, SecretId)>, StoreError>;

    // ───────────────────────────────────── Commit log ──────────────────────────────────────

    /// Append one commit and its change rows in a single transaction.
    async fn create_commit(
        &self,
        params: &CreateCommitParams,
        changes: &[CommitChange],
    ) -> Result<Commit, StoreError>;

    /// Get commit by ID.
    async fn get_commit(&self, commit_id: &CommitId) -> Result<Commit, StoreError>;

    /// Latest commit of a folder, if any.
    async fn latest_commit(&self, folder_id: &FolderId) -> Result<Option<Commit>, StoreError>;

    /// Latest commit anywhere in an environment, if any.
    async fn latest_env_commit(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Option<Commit>, StoreError>;

    /// Latest commit per given folder, optionally bounded by `max_seq`.
    async fn latest_commits_for_folders(
        &self,
        folder_ids: &[FolderId],
        max_seq: Option<i64>,
    ) -> Result<Vec<Commit>, StoreError>;

    /// Latest commit of a folder created at or before `at`.
    async fn commit_at_or_before(
        &self,
        folder_id: &FolderId,
        at: DateTime<Utc>,
    ) -> Result<Option<Commit>, StoreError>;

    /// All commits of a folder, newest first.
    async fn commits_for_folder(&self, folder_id: &FolderId) -> Result<Vec<Commit>, StoreError>;

    /// Commits of a folder with `seq > after_seq`.
    async fn count_commits_after(
        &self,
        folder_id: &FolderId,
        after_seq: i64,
    ) -> Result<u64, StoreError>;

    /// Commits in an environment with `seq > after_seq`.
    async fn count_env_commits_after(
        &self,
        env_id: &EnvironmentId,
        after_seq: i64,
    ) -> Result<u64, StoreError>;

    /// Resolved change rows of a folder with `after_seq < seq <= upto_seq`,
    /// ordered by seq then change row order.
    async fn changes_between(
        &self,
        folder_id: &FolderId,
        after_seq: i64,
        upto_seq: i64,
    ) -> Result<Vec<ChangeRecord>, StoreError>;

    /// Resolved change rows of a single commit, in row order.
    async fn changes_for_commit(
        &self,
        commit_id: &CommitId,
    ) -> Result<Vec<ChangeRecord>, StoreError>;

    /// Subset of the given folders that already have at least one commit.
    async fn folder_ids_with_commits(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<FolderId>, StoreError>;

    /// Latest commit per folder in an environment with
    /// `seq > after_seq` and `created_at <= upto`.
    async fn latest_commits_between(
        &self,
        env_id: &EnvironmentId,
        after_seq: i64,
        upto: DateTime<Utc>,
    ) -> Result<Vec<Commit>, StoreError>;

    // ───────────────────────────────────── Bulk (backfill) ─────────────────────────────────

    /// Insert many commits in one transaction. Returned commits align with
    /// the input order and carry assigned seqs.
    async fn insert_commits(
        &self,
        params: &[CreateCommitParams],
    ) -> Result<Vec<Commit>, StoreError>;

    /// Insert many change rows in one transaction.
    async fn insert_commit_changes(
        &self,
        rows: &[(CommitId, CommitChange)],
    ) -> Result<u64, StoreError>;

    /// Insert one checkpoint row per commit in one transaction, aligned with
    /// the input order.
    async fn insert_checkpoints(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<Checkpoint>, StoreError>;

    /// Insert many checkpoint resource rows in one transaction.
    async fn insert_checkpoint_resources(
        &self,
        rows: &[(CheckpointId, VersionRef)],
    ) -> Result<u64, StoreError>;

    /// Insert one tree checkpoint row per root commit in one transaction,
    /// aligned with the input order.
    async fn insert_tree_checkpoints(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<TreeCheckpoint>, StoreError>;

    /// Insert many tree checkpoint coverage rows in one transaction.
    async fn insert_tree_checkpoint_resources(
        &self,
        rows: &[(TreeCheckpointId, TreeCheckpointResource)],
    ) -> Result<u64, StoreError>;

    /// Delete all platform commits carrying the given message; cascades to
    /// change rows, checkpoints and tree checkpoints. Returns commits removed.
    async fn delete_platform_commits(&self, message: &str) -> Result<u64, StoreError>;

    // ───────────────────────────────────── Checkpoints ─────────────────────────────────────

    /// Persist a checkpoint and its resource set in a single transaction.
    async fn create_checkpoint(
        &self,
        params: &CreateCheckpointParams,
    ) -> Result<Checkpoint, StoreError>;

    /// Latest checkpoint of a folder, if any.
    async fn latest_checkpoint(
        &self,
        folder_id: &FolderId,
    ) -> Result<Option<Checkpoint>, StoreError>;

    /// Nearest checkpoint of a folder with `commit seq <= max_seq`.
    async fn nearest_checkpoint(
        &self,
        folder_id: &FolderId,
        max_seq: i64,
    ) -> Result<Option<Checkpoint>, StoreError>;

    /// Checkpoints of a folder, newest first.
    async fn checkpoints_for_folder(
        &self,
        folder_id: &FolderId,
        limit: Option<u32>,
    ) -> Result<Vec<Checkpoint>, StoreError>;

    /// Resolved resource set materialized by a checkpoint.
    async fn checkpoint_resources(
        &self,
        checkpoint_id: &CheckpointId,
    ) -> Result<Vec<ResourceState>, StoreError>;

    // ───────────────────────────────────── Tree checkpoints ────────────────────────────────

    /// Persist a tree checkpoint and its coverage rows in a single transaction.
    async fn create_tree_checkpoint(
        &self,
        params: &CreateTreeCheckpointParams,
    ) -> Result<TreeCheckpoint, StoreError>;

    /// Latest tree checkpoint of an environment, if any.
    async fn latest_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Option<TreeCheckpoint>, StoreError>;

    /// Nearest tree checkpoint of an environment taken at or before `at`.
    async fn nearest_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
        at: DateTime<Utc>,
    ) -> Result<Option<TreeCheckpoint>, StoreError>;

    /// Coverage rows of a tree checkpoint.
    async fn tree_checkpoint_resources(
        &self,
        tree_checkpoint_id: &TreeCheckpointId,
    ) -> Result<Vec<TreeCheckpointResource>, StoreError>;
}
