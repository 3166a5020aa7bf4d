//! Commit log writer.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use strata_storage::types::*;
use strata_storage::PitStore;

use crate::{EngineError, PitEngine};

/// Caller-supplied commit fields; the environment is derived from the folder.
#[derive(Clone, Debug)]
pub struct CommitParams {
    pub folder_id: FolderId,
    pub actor: Actor,
    pub message: Option<String>,
}

/// One commit with its resolved changes.
#[derive(Clone, Debug)]
pub struct CommitDetails {
    pub commit: Commit,
    pub changes: Vec<ChangeRecord>,
    /// Whether this is the folder's newest commit.
    pub is_latest: bool,
}

impl<S: PitStore> PitEngine<S> {
    /// Append a commit to a folder's log.
    ///
    /// The change set must be non-empty, reference only existing version
    /// rows, and carry at most one non-delete change per resource identity.
    /// The commit and its change rows are written atomically; no checkpoint
    /// is taken here.
    pub async fn record_commit(
        &self,
        params: CommitParams,
        changes: Vec<CommitChange>,
    ) -> Result<Commit, EngineError> {
        if changes.is_empty() {
            return Err(EngineError::EmptyChangeSet);
        }
        let folder = self.store().get_folder(&params.folder_id).await?;
        if folder.is_reserved {
            return Err(EngineError::ReservedFolder(folder.id));
        }
        self.validate_changes(&changes).await?;

        let commit = self
            .store()
            .create_commit(
                &CreateCommitParams {
                    folder_id: folder.id,
                    environment_id: folder.environment_id,
                    actor: params.actor,
                    message: params.message,
                },
                &changes,
            )
            .await?;
        debug!(
            folder = %folder.id.0,
            commit = %commit.id.0,
            seq = commit.seq,
            changes = changes.len(),
            "commit recorded"
        );
        Ok(commit)
    }

    /// All commits of a folder, newest first.
    pub async fn commits_for_folder(&self, folder_id: &FolderId) -> Result<Vec<Commit>, EngineError> {
        Ok(self.store().commits_for_folder(folder_id).await?)
    }

    /// The folder's newest commit, if any.
    pub async fn latest_commit(&self, folder_id: &FolderId) -> Result<Option<Commit>, EngineError> {
        Ok(self.store().latest_commit(folder_id).await?)
    }

    /// One commit with its resolved change rows.
    pub async fn commit_changes(&self, commit_id: &CommitId) -> Result<CommitDetails, EngineError> {
        let commit = self.store().get_commit(commit_id).await?;
        let changes = self.store().changes_for_commit(commit_id).await?;
        let latest = self.store().latest_commit(&commit.folder_id).await?;
        let is_latest = latest.map(|l| l.id == commit.id).unwrap_or(false);
        Ok(CommitDetails {
            commit,
            changes,
            is_latest,
        })
    }

    async fn validate_changes(&self, changes: &[CommitChange]) -> Result<(), EngineError> {
        let mut folder_versions: Vec<FolderVersionId> = Vec::new();
        let mut secret_versions: Vec<SecretVersionId> = Vec::new();
        for change in changes {
            match change.version_ref() {
                VersionRef::Folder(id) => folder_versions.push(id),
                VersionRef::Secret(id) => secret_versions.push(id),
            }
        }
        folder_versions.sort();
        folder_versions.dedup();
        secret_versions.sort();
        secret_versions.dedup();

        let folder_owners: HashMap<FolderVersionId, FolderId> = self
            .store()
            .folder_version_owners(&folder_versions)
            .await?
            .into_iter()
            .collect();
        for id in &folder_versions {
            if !folder_owners.contains_key(id) {
                return Err(EngineError::UnknownVersion(VersionRef::Folder(*id)));
            }
        }
        let secret_owners: HashMap<SecretVersionId, SecretId> = self
            .store()
            .secret_version_owners(&secret_versions)
            .await?
            .into_iter()
            .collect();
        for id in &secret_versions {
            if !secret_owners.contains_key(id) {
                return Err(EngineError::UnknownVersion(VersionRef::Secret(*id)));
            }
        }

        // At most one Add/Update per resource identity; extra Deletes are
        // harmless and allowed.
        let mut seen: HashSet<ResourceKey> = HashSet::new();
        for change in changes {
            if change.op() == ChangeOp::Delete {
                continue;
            }
            let key = match change.version_ref() {
                VersionRef::Folder(id) => ResourceKey::Folder(folder_owners[&id]),
                VersionRef::Secret(id) => ResourceKey::Secret(secret_owners[&id]),
            };
            if !seen.insert(key) {
                return Err(EngineError::DuplicateResource(key));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use strata_storage::MockPitStore;

    use super::*;

    fn folder(id: FolderId, env: EnvironmentId, is_reserved: bool) -> Folder {
        Folder {
            id,
            environment_id: env,
            parent_id: None,
            name: "root".into(),
            version: 1,
            is_reserved,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rejects_empty_change_set() {
        let engine = PitEngine::new(Arc::new(MockPitStore::new()));
        let err = engine
            .record_commit(
                CommitParams {
                    folder_id: FolderId(Uuid::new_v4()),
                    actor: Actor::platform(),
                    message: None,
                },
                vec![],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyChangeSet));
    }

    #[tokio::test]
    async fn rejects_reserved_folder() {
        let folder_id = FolderId(Uuid::new_v4());
        let env = EnvironmentId(Uuid::new_v4());
        let mut store = MockPitStore::new();
        store
            .expect_get_folder()
            .returning(move |id| Ok(folder(*id, env, true)));

        let engine = PitEngine::new(Arc::new(store));
        let err = engine
            .record_commit(
                CommitParams {
                    folder_id,
                    actor: Actor::platform(),
                    message: None,
                },
                vec![CommitChange::SecretAdd(SecretVersionId(Uuid::new_v4()))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReservedFolder(f) if f == folder_id));
    }

    #[tokio::test]
    async fn rejects_unknown_version() {
        let env = EnvironmentId(Uuid::new_v4());
        let mut store = MockPitStore::new();
        store
            .expect_get_folder()
            .returning(move |id| Ok(folder(*id, env, false)));
        store
            .expect_folder_version_owners()
            .returning(|_| Ok(vec![]));
        store
            .expect_secret_version_owners()
            .returning(|_| Ok(vec![]));

        let engine = PitEngine::new(Arc::new(store));
        let missing = SecretVersionId(Uuid::new_v4());
        let err = engine
            .record_commit(
                CommitParams {
                    folder_id: FolderId(Uuid::new_v4()),
                    actor: Actor::platform(),
                    message: None,
                },
                vec![CommitChange::SecretAdd(missing)],
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::UnknownVersion(VersionRef::Secret(v)) if v == missing)
        );
    }

    #[tokio::test]
    async fn rejects_two_upserts_for_one_resource() {
        let env = EnvironmentId(Uuid::new_v4());
        let secret_id = SecretId(Uuid::new_v4());
        let v1 = SecretVersionId(Uuid::new_v4());
        let v2 = SecretVersionId(Uuid::new_v4());

        let mut store = MockPitStore::new();
        store
            .expect_get_folder()
            .returning(move |id| Ok(folder(*id, env, false)));
        store
            .expect_folder_version_owners()
            .returning(|_| Ok(vec![]));
        store
            .expect_secret_version_owners()
            .returning(move |ids| Ok(ids.iter().map(|v| (*v, secret_id)).collect()));

        let engine = PitEngine::new(Arc::new(store));
        let err = engine
            .record_commit(
                CommitParams {
                    folder_id: FolderId(Uuid::new_v4()),
                    actor: Actor::platform(),
                    message: None,
                },
                vec![CommitChange::SecretAdd(v1), CommitChange::SecretUpdate(v2)],
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::DuplicateResource(ResourceKey::Secret(s)) if s == secret_id)
        );
    }

    #[tokio::test]
    async fn delete_pairs_with_upsert_are_allowed() {
        let env = EnvironmentId(Uuid::new_v4());
        let folder_id = FolderId(Uuid::new_v4());
        let secret_id = SecretId(Uuid::new_v4());
        let v1 = SecretVersionId(Uuid::new_v4());
        let v2 = SecretVersionId(Uuid::new_v4());

        let mut store = MockPitStore::new();
        store
            .expect_get_folder()
            .returning(move |id| Ok(folder(*id, env, false)));
        store
            .expect_folder_version_owners()
            .returning(|_| Ok(vec![]));
        store
            .expect_secret_version_owners()
            .returning(move |ids| Ok(ids.iter().map(|v| (*v, secret_id)).collect()));
        store.expect_create_commit().returning(move |params, _| {
            Ok(Commit {
                id: CommitId(Uuid::now_v7()),
                folder_id: params.folder_id,
                environment_id: params.environment_id,
                seq: 1,
                actor: params.actor.clone(),
                message: params.message.clone(),
                created_at: Utc::now(),
            })
        });

        let engine = PitEngine::new(Arc::new(store));
        let commit = engine
            .record_commit(
                CommitParams {
                    folder_id,
                    actor: Actor::user(Uuid::new_v4()),
                    message: Some("rotate".into()),
                },
                vec![
                    CommitChange::SecretDelete(v1),
                    CommitChange::SecretAdd(v2),
                ],
            )
            .await
            .unwrap();
        assert_eq!(commit.folder_id, folder_id);
        assert_eq!(commit.environment_id, env);
    }
}
