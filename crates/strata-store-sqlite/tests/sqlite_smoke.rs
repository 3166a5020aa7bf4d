use strata_storage::types::*;
use strata_storage::{PitStore, StoreError};
use strata_store_sqlite::SqliteStore;

async fn seed_env(s: &SqliteStore) -> EnvironmentId {
    let project_id = s
        .create_project(&CreateProjectParams { name: "p1".into() })
        .await
        .unwrap();
    s.create_environment(&CreateEnvironmentParams {
        project_id,
        name: "prod".into(),
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn reopens_file_backed_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("strata.db").display());

    let s = SqliteStore::open(&url).await.unwrap();
    seed_env(&s).await;
    drop(s);

    let s = SqliteStore::open(&url).await.unwrap();
    assert_eq!(s.list_project_ids().await.unwrap().len(), 1);
}

#[tokio::test]
async fn folder_and_secret_versioning() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let env_id = seed_env(&s).await;

    let (root_id, _root_v1) = s
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap();

    let root = s.get_folder(&root_id).await.unwrap();
    assert_eq!(root.version, 1);
    assert!(root.parent_id.is_none());

    let v2 = s
        .update_folder(&UpdateFolderParams {
            folder_id: root_id,
            name: "root-renamed".into(),
            parent_id: None,
        })
        .await
        .unwrap();
    let root = s.get_folder(&root_id).await.unwrap();
    assert_eq!(root.version, 2);
    assert_eq!(root.name, "root-renamed");

    let latest = s.latest_folder_versions(&[root_id]).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, v2);
    assert_eq!(latest[0].version, 2);

    let (secret_id, sv1) = s
        .create_secret(&CreateSecretParams {
            folder_id: root_id,
            key: "DB_URL".into(),
            encrypted_value: vec![1, 2, 3],
        })
        .await
        .unwrap();
    let sv2 = s
        .update_secret(&UpdateSecretParams {
            secret_id,
            encrypted_value: vec![4, 5, 6],
        })
        .await
        .unwrap();
    assert_ne!(sv1, sv2);

    let latest = s.latest_secret_versions(&[root_id]).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, sv2);
    assert_eq!(latest[0].version, 2);

    // version rows survive resource deletion
    s.delete_secret(&secret_id).await.unwrap();
    let owners = s.secret_version_owners(&[sv1, sv2]).await.unwrap();
    assert_eq!(owners.len(), 2);
    assert!(matches!(
        s.delete_secret(&secret_id).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn commit_log_ordering_and_atomicity() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let env_id = seed_env(&s).await;
    let (folder_id, folder_v1) = s
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    let (_secret_id, sv1) = s
        .create_secret(&CreateSecretParams {
            folder_id,
            key: "API_KEY".into(),
            encrypted_value: vec![7],
        })
        .await
        .unwrap();

    let c1 = s
        .create_commit(
            &CreateCommitParams {
                folder_id,
                environment_id: env_id,
                actor: Actor::platform(),
                message: Some("first".into()),
            },
            &[
                CommitChange::FolderAdd(folder_v1),
                CommitChange::SecretAdd(sv1),
            ],
        )
        .await
        .unwrap();
    let c2 = s
        .create_commit(
            &CreateCommitParams {
                folder_id,
                environment_id: env_id,
                actor: Actor::platform(),
                message: None,
            },
            &[CommitChange::SecretDelete(sv1)],
        )
        .await
        .unwrap();
    assert!(c2.seq > c1.seq);

    let latest = s.latest_commit(&folder_id).await.unwrap().unwrap();
    assert_eq!(latest.id, c2.id);
    assert_eq!(s.count_commits_after(&folder_id, c1.seq).await.unwrap(), 1);

    let records = s.changes_between(&folder_id, 0, c2.seq).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].op, ChangeOp::Add);
    assert_eq!(records[2].op, ChangeOp::Delete);
    // within-commit order is the insertion order
    assert!(matches!(records[0].state, ResourceState::Folder(_)));
    assert!(matches!(records[1].state, ResourceState::Secret(_)));

    let only_c2 = s.changes_between(&folder_id, c1.seq, c2.seq).await.unwrap();
    assert_eq!(only_c2.len(), 1);
    assert_eq!(only_c2[0].commit_id, c2.id);

    let commits = s.commits_for_folder(&folder_id).await.unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].id, c2.id);
}

#[tokio::test]
async fn checkpoints_and_tree_checkpoints() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let env_id = seed_env(&s).await;
    let (folder_id, folder_v1) = s
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    let (child_id, _) = s
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: Some(folder_id),
            name: "app".into(),
            is_reserved: false,
        })
        .await
        .unwrap();

    let c1 = s
        .create_commit(
            &CreateCommitParams {
                folder_id,
                environment_id: env_id,
                actor: Actor::platform(),
                message: None,
            },
            &[CommitChange::FolderAdd(folder_v1)],
        )
        .await
        .unwrap();

    let cp = s
        .create_checkpoint(&CreateCheckpointParams {
            commit_id: c1.id,
            resources: vec![VersionRef::Folder(folder_v1)],
        })
        .await
        .unwrap();
    assert_eq!(cp.folder_id, folder_id);
    assert_eq!(cp.commit_seq, c1.seq);

    // 1:1 with the commit
    assert!(matches!(
        s.create_checkpoint(&CreateCheckpointParams {
            commit_id: c1.id,
            resources: vec![],
        })
        .await,
        Err(StoreError::AlreadyExists)
    ));

    let nearest = s.nearest_checkpoint(&folder_id, c1.seq).await.unwrap();
    assert_eq!(nearest.unwrap().id, cp.id);
    assert!(s
        .nearest_checkpoint(&folder_id, c1.seq - 1)
        .await
        .unwrap()
        .is_none());

    let resources = s.checkpoint_resources(&cp.id).await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].version_ref(), VersionRef::Folder(folder_v1));

    let tcp = s
        .create_tree_checkpoint(&CreateTreeCheckpointParams {
            commit_id: c1.id,
            resources: vec![
                TreeCheckpointResource {
                    folder_id,
                    commit_id: Some(c1.id),
                },
                TreeCheckpointResource {
                    folder_id: child_id,
                    commit_id: None,
                },
            ],
        })
        .await
        .unwrap();
    assert_eq!(tcp.environment_id, env_id);

    let rows = s.tree_checkpoint_resources(&tcp.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].commit_id, None);

    let found = s
        .nearest_tree_checkpoint(&env_id, chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, tcp.id);
}

#[tokio::test]
async fn bulk_insert_and_rollback() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let env_id = seed_env(&s).await;
    let (a, av) = s
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    let (b, bv) = s
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: Some(a),
            name: "b".into(),
            is_reserved: false,
        })
        .await
        .unwrap();

    let message = Some("Initialized folder".to_string());
    let commits = s
        .insert_commits(&[
            CreateCommitParams {
                folder_id: a,
                environment_id: env_id,
                actor: Actor::platform(),
                message: message.clone(),
            },
            CreateCommitParams {
                folder_id: b,
                environment_id: env_id,
                actor: Actor::platform(),
                message: message.clone(),
            },
        ])
        .await
        .unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].folder_id, a);
    assert_eq!(commits[1].seq, commits[0].seq + 1);

    let checkpoints = s
        .insert_checkpoints(&[commits[0].id, commits[1].id])
        .await
        .unwrap();
    assert_eq!(checkpoints[1].folder_id, b);

    s.insert_commit_changes(&[
        (commits[0].id, CommitChange::FolderAdd(bv)),
        (commits[1].id, CommitChange::FolderAdd(av)),
    ])
    .await
    .unwrap();
    s.insert_checkpoint_resources(&[(checkpoints[0].id, VersionRef::Folder(bv))])
        .await
        .unwrap();

    let tcps = s.insert_tree_checkpoints(&[commits[0].id]).await.unwrap();
    s.insert_tree_checkpoint_resources(&[(
        tcps[0].id,
        TreeCheckpointResource {
            folder_id: b,
            commit_id: Some(commits[1].id),
        },
    )])
    .await
    .unwrap();

    let with_commits = s.folder_ids_with_commits(&[a, b]).await.unwrap();
    assert_eq!(with_commits.len(), 2);

    // rollback removes the synthesized commits and cascades everything
    let removed = s.delete_platform_commits("Initialized folder").await.unwrap();
    assert_eq!(removed, 2);
    assert!(s.latest_commit(&a).await.unwrap().is_none());
    assert!(s.latest_checkpoint(&a).await.unwrap().is_none());
    assert!(s.latest_tree_checkpoint(&env_id).await.unwrap().is_none());
}
