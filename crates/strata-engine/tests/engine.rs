use std::sync::Arc;

use chrono::Utc;

use strata_engine::{
    BackfillConfig, CommitParams, CommitRef, DiffOp, EngineConfig, PitEngine, BACKFILL_MESSAGE,
};
use strata_storage::types::*;
use strata_storage::PitStore;
use strata_store_sqlite::SqliteStore;

async fn engine() -> PitEngine<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    PitEngine::new(Arc::new(store))
}

async fn seed_env(e: &PitEngine<SqliteStore>) -> EnvironmentId {
    let project_id = e
        .store()
        .create_project(&CreateProjectParams { name: "p".into() })
        .await
        .unwrap();
    e.store()
        .create_environment(&CreateEnvironmentParams {
            project_id,
            name: "prod".into(),
        })
        .await
        .unwrap()
}

async fn root_folder(e: &PitEngine<SqliteStore>, env: EnvironmentId) -> (FolderId, FolderVersionId) {
    e.store()
        .create_folder(&CreateFolderParams {
            environment_id: env,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap()
}

fn params(folder_id: FolderId) -> CommitParams {
    CommitParams {
        folder_id,
        actor: Actor::platform(),
        message: None,
    }
}

fn keys(state: &[ResourceState]) -> Vec<(ResourceKey, VersionRef)> {
    state.iter().map(|s| (s.identity(), s.version_ref())).collect()
}

/// Checkpoint + replay must equal full replay at every commit.
#[tokio::test]
async fn checkpoint_replay_equals_full_replay() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (folder, _) = root_folder(&e, env).await;

    let mut commits = Vec::new();
    let (s1, s1v1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "A".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();
    commits.push(
        e.record_commit(params(folder), vec![CommitChange::SecretAdd(s1v1)])
            .await
            .unwrap(),
    );
    let (_s2, s2v1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "B".into(),
            encrypted_value: vec![2],
        })
        .await
        .unwrap();
    commits.push(
        e.record_commit(params(folder), vec![CommitChange::SecretAdd(s2v1)])
            .await
            .unwrap(),
    );
    let s1v2 = e
        .store()
        .update_secret(&UpdateSecretParams {
            secret_id: s1,
            encrypted_value: vec![3],
        })
        .await
        .unwrap();
    commits.push(
        e.record_commit(params(folder), vec![CommitChange::SecretUpdate(s1v2)])
            .await
            .unwrap(),
    );
    commits.push(
        e.record_commit(params(folder), vec![CommitChange::SecretDelete(s2v1)])
            .await
            .unwrap(),
    );

    // full replay, no checkpoints yet
    let mut plain = Vec::new();
    for commit in &commits {
        plain.push(e.resolve_folder(&folder, CommitRef::Id(commit.id)).await.unwrap());
    }

    e.create_checkpoint(&folder, &commits[1].id).await.unwrap();
    for (commit, expected) in commits.iter().zip(&plain) {
        let got = e.resolve_folder(&folder, CommitRef::Id(commit.id)).await.unwrap();
        assert_eq!(keys(&got), keys(expected));
    }

    // final state: A at v2, B gone
    let last = plain.last().unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].version_ref(), VersionRef::Secret(s1v2));
}

#[tokio::test]
async fn resolve_is_idempotent_and_read_only() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (folder, _) = root_folder(&e, env).await;
    let (_s, sv) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "A".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();
    let c = e
        .record_commit(params(folder), vec![CommitChange::SecretAdd(sv)])
        .await
        .unwrap();

    let first = e.resolve_folder(&folder, CommitRef::Id(c.id)).await.unwrap();
    let second = e.resolve_folder(&folder, CommitRef::Id(c.id)).await.unwrap();
    assert_eq!(keys(&first), keys(&second));
    assert_eq!(e.commits_for_folder(&folder).await.unwrap().len(), 1);
    assert!(e.latest_checkpoint(&folder).await.unwrap().is_none());
}

#[tokio::test]
async fn folder_without_history_resolves_empty() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (folder, _) = root_folder(&e, env).await;

    let state = e
        .resolve_folder(&folder, CommitRef::At(Utc::now()))
        .await
        .unwrap();
    assert!(state.is_empty());
}

/// A commit row must never become visible without its change rows.
#[tokio::test]
async fn commit_is_atomic_with_its_changes() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (folder, _) = root_folder(&e, env).await;

    // bypass engine validation so the change row violates its FK
    let bogus = FolderVersionId(uuid::Uuid::new_v4());
    let res = e
        .store()
        .create_commit(
            &CreateCommitParams {
                folder_id: folder,
                environment_id: env,
                actor: Actor::platform(),
                message: None,
            },
            &[CommitChange::FolderAdd(bogus)],
        )
        .await;
    assert!(res.is_err());
    assert!(e.store().latest_commit(&folder).await.unwrap().is_none());
}

/// Backfill worked example: root F with child G and secret S1.
#[tokio::test]
async fn backfill_seeds_history_for_unversioned_tree() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (f, _fv) = root_folder(&e, env).await;
    let (g, gv) = e
        .store()
        .create_folder(&CreateFolderParams {
            environment_id: env,
            parent_id: Some(f),
            name: "g".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    let (_s1, s1v) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: f,
            key: "S1".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();

    let report = e.run_backfill(&BackfillConfig::default()).await.unwrap();
    assert_eq!(report.folders_seen, 2);
    // G is empty: covered by the tree checkpoint but gets no commit
    assert_eq!(report.commits, 1);
    assert_eq!(report.changes, 2);
    assert_eq!(report.checkpoints, 1);
    assert_eq!(report.checkpoint_resources, 2);
    assert_eq!(report.tree_checkpoints, 1);
    assert_eq!(report.tree_checkpoint_resources, 2);
    assert!(report.skipped_folders.is_empty());

    let commit = e.store().latest_commit(&f).await.unwrap().unwrap();
    assert_eq!(commit.actor.actor_type, ActorType::Platform);
    assert_eq!(commit.message.as_deref(), Some(BACKFILL_MESSAGE));
    assert!(e.store().latest_commit(&g).await.unwrap().is_none());

    let state = e.resolve_folder(&f, CommitRef::At(Utc::now())).await.unwrap();
    let refs: Vec<VersionRef> = state.iter().map(|s| s.version_ref()).collect();
    assert!(refs.contains(&VersionRef::Folder(gv)));
    assert!(refs.contains(&VersionRef::Secret(s1v)));

    let tree = e.resolve_tree(&env, Utc::now()).await.unwrap();
    assert_eq!(tree.len(), 2);
    let g_state = tree.iter().find(|t| t.folder_id == g).unwrap();
    assert!(g_state.commit_id.is_none());
    assert!(g_state.resources.is_empty());

    // re-run is a no-op
    let again = e.run_backfill(&BackfillConfig::default()).await.unwrap();
    assert_eq!(again.commits, 0);
    assert_eq!(again.tree_checkpoints, 0);
    assert_eq!(again.folders_already_versioned, 1);
}

/// Post-backfill update: S1 moves to v2, history keeps v1.
#[tokio::test]
async fn post_backfill_update_preserves_history() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (f, _) = root_folder(&e, env).await;
    let (s1, s1v1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: f,
            key: "S1".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();
    e.run_backfill(&BackfillConfig::default()).await.unwrap();
    let backfill_commit = e.store().latest_commit(&f).await.unwrap().unwrap();

    let s1v2 = e
        .store()
        .update_secret(&UpdateSecretParams {
            secret_id: s1,
            encrypted_value: vec![2],
        })
        .await
        .unwrap();
    let update_commit = e
        .record_commit(
            CommitParams {
                folder_id: f,
                actor: Actor::user(uuid::Uuid::new_v4()),
                message: Some("rotate S1".into()),
            },
            vec![CommitChange::SecretUpdate(s1v2)],
        )
        .await
        .unwrap();

    let now = e
        .resolve_folder(&f, CommitRef::Id(update_commit.id))
        .await
        .unwrap();
    assert_eq!(now.len(), 1);
    assert_eq!(now[0].version_ref(), VersionRef::Secret(s1v2));

    let then = e
        .resolve_folder(&f, CommitRef::Id(backfill_commit.id))
        .await
        .unwrap();
    assert_eq!(then.len(), 1);
    assert_eq!(then[0].version_ref(), VersionRef::Secret(s1v1));

    let diff = e
        .compare_states(&f, Some(update_commit.id), backfill_commit.id, DiffOp::Create)
        .await
        .unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].op, DiffOp::Update);
    assert_eq!(diff[0].from_version, Some(VersionRef::Secret(s1v2)));
}

/// Inputs above the row ceiling are split; the union of chunks is exact.
#[tokio::test]
async fn backfill_chunks_bulk_inserts() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (root, _) = root_folder(&e, env).await;
    let mut folders = vec![root];
    for i in 0..6 {
        let (id, _) = e
            .store()
            .create_folder(&CreateFolderParams {
                environment_id: env,
                parent_id: Some(root),
                name: format!("f{i}"),
                is_reserved: false,
            })
            .await
            .unwrap();
        folders.push(id);
        e.store()
            .create_secret(&CreateSecretParams {
                folder_id: id,
                key: "K".into(),
                encrypted_value: vec![i],
            })
            .await
            .unwrap();
    }

    let config = BackfillConfig {
        insert_batch_rows: 2,
        ..Default::default()
    };
    let report = e.run_backfill(&config).await.unwrap();
    // 6 children with one secret each, plus the root's 6 child adds
    assert_eq!(report.commits, 7);
    assert_eq!(report.changes, 12);
    assert_eq!(report.checkpoints, 7);
    assert_eq!(report.tree_checkpoint_resources, 7);
    for folder in &folders {
        assert!(e.store().latest_commit(folder).await.unwrap().is_some());
    }

    // rollback drops everything the run created
    let removed = e.rollback_backfill().await.unwrap();
    assert_eq!(removed, 7);
    assert!(e.store().latest_commit(&root).await.unwrap().is_none());
    assert!(e.store().latest_tree_checkpoint(&env).await.unwrap().is_none());
}

/// Tree resolution reports only what history records: commitless folders
/// enter the result once a tree checkpoint covers them, not before.
#[tokio::test]
async fn resolve_tree_lists_commitless_folders_only_once_covered() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (root, _) = root_folder(&e, env).await;
    let (empty, _) = e
        .store()
        .create_folder(&CreateFolderParams {
            environment_id: env,
            parent_id: Some(root),
            name: "empty".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    let (_s, sv) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: root,
            key: "K".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();
    let commit = e
        .record_commit(params(root), vec![CommitChange::SecretAdd(sv)])
        .await
        .unwrap();

    // no tree checkpoint yet: only the committed folder is present
    let tree = e.resolve_tree(&env, Utc::now()).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].folder_id, root);

    e.create_tree_checkpoint(&env, &commit.id).await.unwrap();
    let tree = e.resolve_tree(&env, Utc::now()).await.unwrap();
    assert_eq!(tree.len(), 2);
    let empty_state = tree.iter().find(|t| t.folder_id == empty).unwrap();
    assert!(empty_state.commit_id.is_none());
    assert!(empty_state.resources.is_empty());
}

/// A zero row ceiling degrades to chunks of one instead of panicking.
#[tokio::test]
async fn backfill_treats_zero_row_ceiling_as_one() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (root, _) = root_folder(&e, env).await;
    e.store()
        .create_secret(&CreateSecretParams {
            folder_id: root,
            key: "K".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();

    let config = BackfillConfig {
        insert_batch_rows: 0,
        ..Default::default()
    };
    let report = e.run_backfill(&config).await.unwrap();
    assert_eq!(report.commits, 1);
    assert_eq!(report.checkpoints, 1);
    assert!(e.store().latest_commit(&root).await.unwrap().is_some());
}

/// Environments without a resolvable root are skipped and reported.
#[tokio::test]
async fn backfill_tolerates_broken_roots() {
    let e = engine().await;
    let project_id = e
        .store()
        .create_project(&CreateProjectParams { name: "p".into() })
        .await
        .unwrap();
    let healthy_env = e
        .store()
        .create_environment(&CreateEnvironmentParams {
            project_id,
            name: "prod".into(),
        })
        .await
        .unwrap();
    let broken_env = e
        .store()
        .create_environment(&CreateEnvironmentParams {
            project_id,
            name: "stage".into(),
        })
        .await
        .unwrap();

    let (h_root, _) = e
        .store()
        .create_folder(&CreateFolderParams {
            environment_id: healthy_env,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    e.store()
        .create_secret(&CreateSecretParams {
            folder_id: h_root,
            key: "K".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();

    // broken: the only top-level folder is reserved, its child is orphaned
    let (reserved_root, _) = e
        .store()
        .create_folder(&CreateFolderParams {
            environment_id: broken_env,
            parent_id: None,
            name: "__reserved".into(),
            is_reserved: true,
        })
        .await
        .unwrap();
    let (orphan, _) = e
        .store()
        .create_folder(&CreateFolderParams {
            environment_id: broken_env,
            parent_id: Some(reserved_root),
            name: "orphan".into(),
            is_reserved: false,
        })
        .await
        .unwrap();

    let report = e.run_backfill(&BackfillConfig::default()).await.unwrap();
    assert_eq!(report.skipped_folders, vec![orphan]);
    assert_eq!(report.commits, 1);
    assert!(e.store().latest_commit(&h_root).await.unwrap().is_some());
    assert!(e.store().latest_commit(&orphan).await.unwrap().is_none());
}

#[tokio::test]
async fn checkpoint_window_gates_materialization() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let e = PitEngine::with_config(
        Arc::new(store),
        EngineConfig {
            checkpoint_window: 2,
            tree_checkpoint_window: 3,
        },
    );
    let env = seed_env(&e).await;
    let (folder, _) = root_folder(&e, env).await;
    let (s, sv1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "A".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();

    e.record_commit(params(folder), vec![CommitChange::SecretAdd(sv1)])
        .await
        .unwrap();
    assert!(e.maybe_checkpoint(&folder).await.unwrap().is_none());

    let sv2 = e
        .store()
        .update_secret(&UpdateSecretParams {
            secret_id: s,
            encrypted_value: vec![2],
        })
        .await
        .unwrap();
    e.record_commit(params(folder), vec![CommitChange::SecretUpdate(sv2)])
        .await
        .unwrap();
    let cp = e.maybe_checkpoint(&folder).await.unwrap().unwrap();
    assert_eq!(cp.folder_id, folder);
    // anchored at the latest commit, nothing further to do
    assert!(e.maybe_checkpoint(&folder).await.unwrap().is_none());

    // tree window: two commits so far, third tips it over
    assert!(e.maybe_tree_checkpoint(&env).await.unwrap().is_none());
    let sv3 = e
        .store()
        .update_secret(&UpdateSecretParams {
            secret_id: s,
            encrypted_value: vec![3],
        })
        .await
        .unwrap();
    e.record_commit(params(folder), vec![CommitChange::SecretUpdate(sv3)])
        .await
        .unwrap();
    let tcp = e.maybe_tree_checkpoint(&env).await.unwrap().unwrap();
    assert_eq!(tcp.environment_id, env);
    assert!(e.maybe_tree_checkpoint(&env).await.unwrap().is_none());
}

#[tokio::test]
async fn compare_states_reports_create_update_delete() {
    let e = engine().await;
    let env = seed_env(&e).await;
    let (folder, _) = root_folder(&e, env).await;

    let (a, av1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "A".into(),
            encrypted_value: vec![1],
        })
        .await
        .unwrap();
    let (_b, bv1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "B".into(),
            encrypted_value: vec![2],
        })
        .await
        .unwrap();
    let c1 = e
        .record_commit(
            params(folder),
            vec![CommitChange::SecretAdd(av1), CommitChange::SecretAdd(bv1)],
        )
        .await
        .unwrap();

    let av2 = e
        .store()
        .update_secret(&UpdateSecretParams {
            secret_id: a,
            encrypted_value: vec![3],
        })
        .await
        .unwrap();
    let (_c, cv1) = e
        .store()
        .create_secret(&CreateSecretParams {
            folder_id: folder,
            key: "C".into(),
            encrypted_value: vec![4],
        })
        .await
        .unwrap();
    let c2 = e
        .record_commit(
            params(folder),
            vec![
                CommitChange::SecretUpdate(av2),
                CommitChange::SecretDelete(bv1),
                CommitChange::SecretAdd(cv1),
            ],
        )
        .await
        .unwrap();

    // moving from c1 to c2: A updates, B deletes, C creates
    let diff = e
        .compare_states(&folder, Some(c1.id), c2.id, DiffOp::Create)
        .await
        .unwrap();
    assert_eq!(diff.len(), 3);
    let update = diff.iter().find(|d| d.op == DiffOp::Update).unwrap();
    assert_eq!(update.state.version_ref(), VersionRef::Secret(av2));
    assert_eq!(update.from_version, Some(VersionRef::Secret(av1)));
    let delete = diff.iter().find(|d| d.op == DiffOp::Delete).unwrap();
    assert_eq!(delete.state.version_ref(), VersionRef::Secret(bv1));
    let create = diff.iter().find(|d| d.op == DiffOp::Create).unwrap();
    assert_eq!(create.state.version_ref(), VersionRef::Secret(cv1));

    // no current commit: the target state maps straight to the default op.
    // At c2 that state is A@v2 and C@v1; B is already gone.
    let all = e
        .compare_states(&folder, None, c2.id, DiffOp::Create)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|d| d.op == DiffOp::Create));
    let refs: Vec<VersionRef> = all.iter().map(|d| d.state.version_ref()).collect();
    assert!(refs.contains(&VersionRef::Secret(av2)));
    assert!(refs.contains(&VersionRef::Secret(cv1)));

    let details = e.commit_changes(&c2.id).await.unwrap();
    assert!(details.is_latest);
    assert_eq!(details.changes.len(), 3);
    let earlier = e.commit_changes(&c1.id).await.unwrap();
    assert!(!earlier.is_latest);
}
