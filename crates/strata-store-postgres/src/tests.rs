use super::*;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};
use strata_storage::{
    Actor, CommitChange, CreateCommitParams, CreateEnvironmentParams, CreateFolderParams,
    CreateProjectParams, CreateSecretParams, PitStore,
};

/// Tests run only when STRATA_TEST_POSTGRES is set; the suite must pass on
/// machines without a reachable postgres.
fn postgres_enabled() -> bool {
    if std::env::var("STRATA_TEST_POSTGRES").is_err() {
        eprintln!("skipping: STRATA_TEST_POSTGRES not set");
        return false;
    }
    true
}

fn admin_url() -> String {
    let pg_user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let pg_pass = std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
    let pg_host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
    let pg_port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5433".to_string());
    format!(
        "postgres://{}:{}@{}:{}/postgres",
        pg_user, pg_pass, pg_host, pg_port
    )
}

/// Create a unique test database and return the PostgresStore
async fn test_store() -> (PostgresStore, String) {
    let db_name = format!("strata_test_{}", Uuid::now_v7().simple());

    let admin = admin_url();
    let mut conn = PgConnection::connect(&admin).await.unwrap();
    conn.execute(format!("CREATE DATABASE {}", db_name).as_str())
        .await
        .unwrap();
    drop(conn);

    let db_url = admin.replace("/postgres", &format!("/{}", db_name));
    let store = PostgresStore::open(&db_url).await.unwrap();
    (store, db_name)
}

async fn cleanup_db(db_name: &str) {
    match PgConnection::connect(&admin_url()).await {
        Ok(mut conn) => {
            let drop_query = format!("DROP DATABASE IF EXISTS {}", db_name);
            if let Err(e) = conn.execute(drop_query.as_str()).await {
                eprintln!("Warning: failed to drop test database {}: {}", db_name, e);
            }
        }
        Err(e) => {
            eprintln!("Warning: failed to connect for cleanup: {}", e);
        }
    }
}

async fn seed_folder(store: &PostgresStore) -> (EnvironmentId, FolderId, FolderVersionId) {
    let project_id = store
        .create_project(&CreateProjectParams {
            name: "proj".into(),
        })
        .await
        .unwrap();
    let env_id = store
        .create_environment(&CreateEnvironmentParams {
            project_id,
            name: "dev".into(),
        })
        .await
        .unwrap();
    let (folder_id, folder_version_id) = store
        .create_folder(&CreateFolderParams {
            environment_id: env_id,
            parent_id: None,
            name: "root".into(),
            is_reserved: false,
        })
        .await
        .unwrap();
    (env_id, folder_id, folder_version_id)
}

#[tokio::test]
async fn commit_round_trip() {
    if !postgres_enabled() {
        return;
    }
    let (store, db_name) = test_store().await;

    let (env_id, folder_id, folder_version_id) = seed_folder(&store).await;
    let (_, secret_version_id) = store
        .create_secret(&CreateSecretParams {
            folder_id,
            key: "API_KEY".into(),
            encrypted_value: vec![1, 2, 3],
        })
        .await
        .unwrap();

    let commit = store
        .create_commit(
            &CreateCommitParams {
                folder_id,
                environment_id: env_id,
                actor: Actor::platform(),
                message: Some("Initialized folder".into()),
            },
            &[
                CommitChange::FolderAdd(folder_version_id),
                CommitChange::SecretAdd(secret_version_id),
            ],
        )
        .await
        .unwrap();
    assert_eq!(commit.seq, 1);

    let fetched = store.get_commit(&commit.id).await.unwrap();
    assert_eq!(fetched.folder_id, folder_id);
    assert_eq!(fetched.message.as_deref(), Some("Initialized folder"));

    let changes = store.changes_for_commit(&commit.id).await.unwrap();
    assert_eq!(changes.len(), 2);

    cleanup_db(&db_name).await;
}

#[tokio::test]
async fn sequence_assigns_monotonic_seq() {
    if !postgres_enabled() {
        return;
    }
    let (store, db_name) = test_store().await;

    let (env_id, folder_id, folder_version_id) = seed_folder(&store).await;
    let mut seqs = Vec::new();
    for _ in 0..3 {
        let commit = store
            .create_commit(
                &CreateCommitParams {
                    folder_id,
                    environment_id: env_id,
                    actor: Actor::platform(),
                    message: None,
                },
                &[CommitChange::FolderUpdate(folder_version_id)],
            )
            .await
            .unwrap();
        seqs.push(commit.seq);
    }
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));

    cleanup_db(&db_name).await;
}

#[tokio::test]
async fn checkpoint_is_unique_per_commit() {
    if !postgres_enabled() {
        return;
    }
    let (store, db_name) = test_store().await;

    let (env_id, folder_id, folder_version_id) = seed_folder(&store).await;
    let commit = store
        .create_commit(
            &CreateCommitParams {
                folder_id,
                environment_id: env_id,
                actor: Actor::platform(),
                message: None,
            },
            &[CommitChange::FolderAdd(folder_version_id)],
        )
        .await
        .unwrap();

    let params = strata_storage::CreateCheckpointParams {
        commit_id: commit.id,
        resources: vec![strata_storage::VersionRef::Folder(folder_version_id)],
    };
    store.create_checkpoint(&params).await.unwrap();
    let err = store.create_checkpoint(&params).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    let nearest = store
        .nearest_checkpoint(&folder_id, commit.seq)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nearest.commit_id, commit.id);
    let resources = store.checkpoint_resources(&nearest.id).await.unwrap();
    assert_eq!(resources.len(), 1);

    cleanup_db(&db_name).await;
}

#[tokio::test]
async fn delete_platform_commits_cascades() {
    if !postgres_enabled() {
        return;
    }
    let (store, db_name) = test_store().await;

    let (env_id, folder_id, folder_version_id) = seed_folder(&store).await;
    let commits = store
        .insert_commits(&[CreateCommitParams {
            folder_id,
            environment_id: env_id,
            actor: Actor::platform(),
            message: Some("Initialized folder".into()),
        }])
        .await
        .unwrap();
    store
        .insert_commit_changes(&[(commits[0].id, CommitChange::FolderAdd(folder_version_id))])
        .await
        .unwrap();
    store.insert_checkpoints(&[commits[0].id]).await.unwrap();

    let removed = store
        .delete_platform_commits("Initialized folder")
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.latest_commit(&folder_id).await.unwrap().is_none());
    assert!(store.latest_checkpoint(&folder_id).await.unwrap().is_none());

    cleanup_db(&db_name).await;
}
