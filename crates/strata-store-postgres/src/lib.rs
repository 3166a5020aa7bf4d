//! Postgres backend for the strata versioning engine.
//!
//! Commit seq values come from a database sequence, so concurrent writers
//! never collide. All multi-row writes run inside a single transaction.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use strata_storage::types::*;
use strata_storage::{PitStore, StoreError};

#[cfg(test)]
mod tests;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const COMMIT_COLS: &str =
    "id, seq, folder_id, environment_id, actor_type, actor_metadata, message, created_at";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn unique_or_backend(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("duplicate key") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

fn actor_columns(actor: &Actor) -> Result<(String, String), StoreError> {
    let meta =
        serde_json::to_string(&actor.metadata).map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok((actor.actor_type.to_string(), meta))
}

fn actor_from_columns(actor_type: &str, metadata: Option<&str>) -> Result<Actor, StoreError> {
    let actor_type = actor_type.parse::<ActorType>().map_err(StoreError::Backend)?;
    let metadata = match metadata {
        Some(json) => {
            serde_json::from_str(json).map_err(|e| StoreError::Backend(e.to_string()))?
        }
        None => ActorMetadata::default(),
    };
    Ok(Actor {
        actor_type,
        metadata,
    })
}

/// (change_type, is_update, secret_version_id, folder_version_id)
fn change_columns(change: &CommitChange) -> (String, bool, Option<Uuid>, Option<Uuid>) {
    let (sv, fv) = match change.version_ref() {
        VersionRef::Secret(id) => (Some(id.0), None),
        VersionRef::Folder(id) => (None, Some(id.0)),
    };
    (change.op().to_string(), change.is_update(), sv, fv)
}

type CommitRow = (
    Uuid,
    i64,
    Uuid,
    Uuid,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

fn commit_from_row(row: CommitRow) -> Result<Commit, StoreError> {
    let (id, seq, folder_id, environment_id, actor_type, metadata, message, created_at) = row;
    Ok(Commit {
        id: CommitId(id),
        folder_id: FolderId(folder_id),
        environment_id: EnvironmentId(environment_id),
        seq,
        actor: actor_from_columns(&actor_type, metadata.as_deref())?,
        message,
        created_at,
    })
}

type FolderRow = (
    Uuid,
    Uuid,
    Option<Uuid>,
    String,
    i64,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn folder_from_row(row: FolderRow) -> Folder {
    let (id, env, parent, name, version, is_reserved, created_at, updated_at) = row;
    Folder {
        id: FolderId(id),
        environment_id: EnvironmentId(env),
        parent_id: parent.map(FolderId),
        name,
        version,
        is_reserved,
        created_at,
        updated_at,
    }
}

/// One side of a LEFT-joined version row pair.
type StateRow = (
    Option<Uuid>,
    Option<Uuid>,
    Option<String>,
    Option<i64>,
    Option<Uuid>,
    Option<Uuid>,
    Option<String>,
    Option<i64>,
);

fn state_from_row(row: StateRow) -> Result<ResourceState, StoreError> {
    match row {
        (Some(vid), Some(sid), Some(key), Some(version), ..) => {
            Ok(ResourceState::Secret(SecretState {
                secret_id: SecretId(sid),
                version_id: SecretVersionId(vid),
                key,
                version,
            }))
        }
        (None, None, None, None, Some(vid), Some(fid), Some(name), Some(version)) => {
            Ok(ResourceState::Folder(FolderState {
                folder_id: FolderId(fid),
                version_id: FolderVersionId(vid),
                name,
                version,
            }))
        }
        _ => Err(StoreError::Backend("change row resolves to no version".into())),
    }
}

/// Change row joined with its commit: (commit_id, seq, change_type, StateRow...).
type ChangeRow = (
    Uuid,
    i64,
    String,
    Option<Uuid>,
    Option<Uuid>,
    Option<String>,
    Option<i64>,
    Option<Uuid>,
    Option<Uuid>,
    Option<String>,
    Option<i64>,
);

fn change_record_from_row(row: ChangeRow) -> Result<ChangeRecord, StoreError> {
    let (commit_id, seq, change_type, a, b, c, d, e, f, g, h) = row;
    Ok(ChangeRecord {
        commit_id: CommitId(commit_id),
        seq,
        op: change_type.parse().map_err(StoreError::Backend)?,
        state: state_from_row((a, b, c, d, e, f, g, h))?,
    })
}

type CheckpointRow = (Uuid, Uuid, Uuid, i64, DateTime<Utc>);

fn checkpoint_from_row(row: CheckpointRow) -> Checkpoint {
    let (id, folder_id, commit_id, seq, created_at) = row;
    Checkpoint {
        id: CheckpointId(id),
        folder_id: FolderId(folder_id),
        commit_id: CommitId(commit_id),
        commit_seq: seq,
        created_at,
    }
}

fn tree_checkpoint_from_row(row: CheckpointRow) -> TreeCheckpoint {
    let (id, environment_id, commit_id, seq, created_at) = row;
    TreeCheckpoint {
        id: TreeCheckpointId(id),
        environment_id: EnvironmentId(environment_id),
        commit_id: CommitId(commit_id),
        commit_seq: seq,
        created_at,
    }
}

#[async_trait::async_trait]
impl PitStore for PostgresStore {
    // ───────────────────────────── Projects / Environments ─────────────────────────────

    async fn create_project(&self, params: &CreateProjectParams) -> Result<ProjectId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO projects(id, name, created_at) VALUES($1,$2,$3)")
            .bind(id)
            .bind(&params.name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(ProjectId(id))
    }

    async fn create_environment(
        &self,
        params: &CreateEnvironmentParams,
    ) -> Result<EnvironmentId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO environments(id, project_id, name, created_at) VALUES($1,$2,$3,$4)")
            .bind(id)
            .bind(params.project_id.0)
            .bind(&params.name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(EnvironmentId(id))
    }

    async fn get_environment(&self, env_id: &EnvironmentId) -> Result<Environment, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>)>(
            "SELECT id, project_id, name, created_at FROM environments WHERE id=$1",
        )
        .bind(env_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((id, project_id, name, created_at)) => Ok(Environment {
                id: EnvironmentId(id),
                project_id: ProjectId(project_id),
                name,
                created_at,
            }),
        }
    }

    async fn list_project_ids(&self) -> Result<Vec<ProjectId>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM projects ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(|(id,)| ProjectId(id)).collect())
    }

    // ───────────────────────────── Folders ─────────────────────────────

    async fn create_folder(
        &self,
        params: &CreateFolderParams,
    ) -> Result<(FolderId, FolderVersionId), StoreError> {
        let folder_id = Uuid::now_v7();
        let version_id = Uuid::now_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO folders(id, environment_id, parent_id, name, version, is_reserved, created_at, updated_at)
             VALUES($1,$2,$3,$4,1,$5,$6,$6)",
        )
        .bind(folder_id)
        .bind(params.environment_id.0)
        .bind(params.parent_id.map(|p| p.0))
        .bind(&params.name)
        .bind(params.is_reserved)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query(
            "INSERT INTO folder_versions(id, folder_id, version, name, parent_id, created_at)
             VALUES($1,$2,1,$3,$4,$5)",
        )
        .bind(version_id)
        .bind(folder_id)
        .bind(&params.name)
        .bind(params.parent_id.map(|p| p.0))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok((FolderId(folder_id), FolderVersionId(version_id)))
    }

    async fn update_folder(
        &self,
        params: &UpdateFolderParams,
    ) -> Result<FolderVersionId, StoreError> {
        let now = Utc::now();
        let version_id = Uuid::now_v7();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let version: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM folders WHERE id=$1 FOR UPDATE")
                .bind(params.folder_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
        let version = version.ok_or(StoreError::NotFound)?.0 + 1;

        sqlx::query("UPDATE folders SET name=$1, parent_id=$2, version=$3, updated_at=$4 WHERE id=$5")
            .bind(&params.name)
            .bind(params.parent_id.map(|p| p.0))
            .bind(version)
            .bind(now)
            .bind(params.folder_id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "INSERT INTO folder_versions(id, folder_id, version, name, parent_id, created_at)
             VALUES($1,$2,$3,$4,$5,$6)",
        )
        .bind(version_id)
        .bind(params.folder_id.0)
        .bind(version)
        .bind(&params.name)
        .bind(params.parent_id.map(|p| p.0))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok(FolderVersionId(version_id))
    }

    async fn delete_folder(&self, folder_id: &FolderId) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM folders WHERE id=$1")
            .bind(folder_id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_folder(&self, folder_id: &FolderId) -> Result<Folder, StoreError> {
        let row = sqlx::query_as::<_, FolderRow>(
            "SELECT id, environment_id, parent_id, name, version, is_reserved, created_at, updated_at
             FROM folders WHERE id=$1",
        )
        .bind(folder_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(folder_from_row).ok_or(StoreError::NotFound)
    }

    async fn list_folders_by_env(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Vec<Folder>, StoreError> {
        let rows = sqlx::query_as::<_, FolderRow>(
            "SELECT id, environment_id, parent_id, name, version, is_reserved, created_at, updated_at
             FROM folders WHERE environment_id=$1 ORDER BY created_at, id",
        )
        .bind(env_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(folder_from_row).collect())
    }

    async fn list_folders_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Folder>, StoreError> {
        if project_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = project_ids.iter().map(|p| p.0).collect();
        let rows = sqlx::query_as::<_, FolderRow>(
            "SELECT f.id, f.environment_id, f.parent_id, f.name, f.version, f.is_reserved, f.created_at, f.updated_at
             FROM folders f
             JOIN environments e ON e.id = f.environment_id
             WHERE e.project_id = ANY($1) ORDER BY f.created_at, f.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(folder_from_row).collect())
    }

    async fn latest_folder_versions(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<FolderVersion>, StoreError> {
        if folder_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = folder_ids.iter().map(|f| f.0).collect();
        let rows = sqlx::query_as::<_, (Uuid, Uuid, i64, String, Option<Uuid>, DateTime<Utc>)>(
            "SELECT DISTINCT ON (folder_id) id, folder_id, version, name, parent_id, created_at
             FROM folder_versions WHERE folder_id = ANY($1)
             ORDER BY folder_id, version DESC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|(id, folder_id, version, name, parent_id, created_at)| FolderVersion {
                id: FolderVersionId(id),
                folder_id: FolderId(folder_id),
                version,
                name,
                parent_id: parent_id.map(FolderId),
                created_at,
            })
            .collect())
    }

    async fn folder_version_owners(
        &self,
        version_ids: &[FolderVersionId],
    ) -> Result<Vec<(FolderVersionId, FolderId)>, StoreError> {
        if version_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = version_ids.iter().map(|v| v.0).collect();
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT id, folder_id FROM folder_versions WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|(v, f)| (FolderVersionId(v), FolderId(f)))
            .collect())
    }

    // ───────────────────────────── Secrets ─────────────────────────────

    async fn create_secret(
        &self,
        params: &CreateSecretParams,
    ) -> Result<(SecretId, SecretVersionId), StoreError> {
        let secret_id = Uuid::now_v7();
        let version_id = Uuid::now_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO secrets(id, folder_id, key, version, created_at, updated_at)
             VALUES($1,$2,$3,1,$4,$4)",
        )
        .bind(secret_id)
        .bind(params.folder_id.0)
        .bind(&params.key)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        sqlx::query(
            "INSERT INTO secret_versions(id, secret_id, folder_id, version, key, encrypted_value, created_at)
             VALUES($1,$2,$3,1,$4,$5,$6)",
        )
        .bind(version_id)
        .bind(secret_id)
        .bind(params.folder_id.0)
        .bind(&params.key)
        .bind(&params.encrypted_value)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok((SecretId(secret_id), SecretVersionId(version_id)))
    }

    async fn update_secret(
        &self,
        params: &UpdateSecretParams,
    ) -> Result<SecretVersionId, StoreError> {
        let now = Utc::now();
        let version_id = Uuid::now_v7();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let row: Option<(Uuid, String, i64)> =
            sqlx::query_as("SELECT folder_id, key, version FROM secrets WHERE id=$1 FOR UPDATE")
                .bind(params.secret_id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
        let (folder_id, key, version) = row.ok_or(StoreError::NotFound)?;
        let version = version + 1;

        sqlx::query("UPDATE secrets SET version=$1, updated_at=$2 WHERE id=$3")
            .bind(version)
            .bind(now)
            .bind(params.secret_id.0)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "INSERT INTO secret_versions(id, secret_id, folder_id, version, key, encrypted_value, created_at)
             VALUES($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(version_id)
        .bind(params.secret_id.0)
        .bind(folder_id)
        .bind(version)
        .bind(&key)
        .bind(&params.encrypted_value)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok(SecretVersionId(version_id))
    }

    async fn delete_secret(&self, secret_id: &SecretId) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM secrets WHERE id=$1")
            .bind(secret_id.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn latest_secret_versions(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<SecretVersion>, StoreError> {
        if folder_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = folder_ids.iter().map(|f| f.0).collect();
        let rows =
            sqlx::query_as::<_, (Uuid, Uuid, Uuid, i64, String, Vec<u8>, DateTime<Utc>)>(
                "SELECT sv.id, sv.secret_id, sv.folder_id, sv.version, sv.key, sv.encrypted_value, sv.created_at
                 FROM secret_versions sv
                 JOIN secrets s ON s.id = sv.secret_id AND s.version = sv.version
                 WHERE s.folder_id = ANY($1) ORDER BY sv.created_at, sv.id",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(
                |(id, secret_id, folder_id, version, key, encrypted_value, created_at)| {
                    SecretVersion {
                        id: SecretVersionId(id),
                        secret_id: SecretId(secret_id),
                        folder_id: FolderId(folder_id),
                        version,
                        key,
                        encrypted_value,
                        created_at,
                    }
                },
            )
            .collect())
    }

    async fn secret_version_owners(
        &self,
        version_ids: &[SecretVersionId],
    ) -> Result<Vec<(SecretVersionId, SecretId)>, StoreError> {
        if version_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = version_ids.iter().map(|v| v.0).collect();
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT id, secret_id FROM secret_versions WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|(v, s)| (SecretVersionId(v), SecretId(s)))
            .collect())
    }

    // ───────────────────────────── Commit log ─────────────────────────────

    async fn create_commit(
        &self,
        params: &CreateCommitParams,
        changes: &[CommitChange],
    ) -> Result<Commit, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let (actor_type, metadata) = actor_columns(&params.actor)?;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let (seq,): (i64,) = sqlx::query_as(
            "INSERT INTO folder_commits(id, folder_id, environment_id, actor_type, actor_metadata, message, created_at)
             VALUES($1,$2,$3,$4,$5,$6,$7) RETURNING seq",
        )
        .bind(id)
        .bind(params.folder_id.0)
        .bind(params.environment_id.0)
        .bind(&actor_type)
        .bind(&metadata)
        .bind(&params.message)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        for change in changes {
            let (change_type, is_update, sv, fv) = change_columns(change);
            sqlx::query(
                "INSERT INTO folder_commit_changes(commit_id, change_type, is_update, secret_version_id, folder_version_id)
                 VALUES($1,$2,$3,$4,$5)",
            )
            .bind(id)
            .bind(change_type)
            .bind(is_update)
            .bind(sv)
            .bind(fv)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        Ok(Commit {
            id: CommitId(id),
            folder_id: params.folder_id,
            environment_id: params.environment_id,
            seq,
            actor: params.actor.clone(),
            message: params.message.clone(),
            created_at: now,
        })
    }

    async fn get_commit(&self, commit_id: &CommitId) -> Result<Commit, StoreError> {
        let row = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE id=$1"
        ))
        .bind(commit_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        match row {
            None => Err(StoreError::NotFound),
            Some(row) => commit_from_row(row),
        }
    }

    async fn latest_commit(&self, folder_id: &FolderId) -> Result<Option<Commit>, StoreError> {
        let row = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE folder_id=$1 ORDER BY seq DESC LIMIT 1"
        ))
        .bind(folder_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(commit_from_row).transpose()
    }

    async fn latest_env_commit(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Option<Commit>, StoreError> {
        let row = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE environment_id=$1 ORDER BY seq DESC LIMIT 1"
        ))
        .bind(env_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(commit_from_row).transpose()
    }

    async fn latest_commits_for_folders(
        &self,
        folder_ids: &[FolderId],
        max_seq: Option<i64>,
    ) -> Result<Vec<Commit>, StoreError> {
        if folder_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = folder_ids.iter().map(|f| f.0).collect();
        let rows = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits
             WHERE seq IN (SELECT MAX(seq) FROM folder_commits
                           WHERE folder_id = ANY($1) AND ($2::BIGINT IS NULL OR seq <= $2)
                           GROUP BY folder_id)"
        ))
        .bind(&ids)
        .bind(max_seq)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(commit_from_row).collect()
    }

    async fn commit_at_or_before(
        &self,
        folder_id: &FolderId,
        at: DateTime<Utc>,
    ) -> Result<Option<Commit>, StoreError> {
        let row = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits
             WHERE folder_id=$1 AND created_at <= $2 ORDER BY seq DESC LIMIT 1"
        ))
        .bind(folder_id.0)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(commit_from_row).transpose()
    }

    async fn commits_for_folder(&self, folder_id: &FolderId) -> Result<Vec<Commit>, StoreError> {
        let rows = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE folder_id=$1 ORDER BY seq DESC"
        ))
        .bind(folder_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(commit_from_row).collect()
    }

    async fn count_commits_after(
        &self,
        folder_id: &FolderId,
        after_seq: i64,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folder_commits WHERE folder_id=$1 AND seq > $2",
        )
        .bind(folder_id.0)
        .bind(after_seq)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(count as u64)
    }

    async fn count_env_commits_after(
        &self,
        env_id: &EnvironmentId,
        after_seq: i64,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM folder_commits WHERE environment_id=$1 AND seq > $2",
        )
        .bind(env_id.0)
        .bind(after_seq)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(count as u64)
    }

    async fn changes_between(
        &self,
        folder_id: &FolderId,
        after_seq: i64,
        upto_seq: i64,
    ) -> Result<Vec<ChangeRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            "SELECT fc.id, fc.seq, ch.change_type,
                    ch.secret_version_id, sv.secret_id, sv.key, sv.version,
                    ch.folder_version_id, fv.folder_id, fv.name, fv.version
             FROM folder_commits fc
             JOIN folder_commit_changes ch ON ch.commit_id = fc.id
             LEFT JOIN secret_versions sv ON sv.id = ch.secret_version_id
             LEFT JOIN folder_versions fv ON fv.id = ch.folder_version_id
             WHERE fc.folder_id=$1 AND fc.seq > $2 AND fc.seq <= $3
             ORDER BY fc.seq, ch.id",
        )
        .bind(folder_id.0)
        .bind(after_seq)
        .bind(upto_seq)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(change_record_from_row).collect()
    }

    async fn changes_for_commit(
        &self,
        commit_id: &CommitId,
    ) -> Result<Vec<ChangeRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            "SELECT fc.id, fc.seq, ch.change_type,
                    ch.secret_version_id, sv.secret_id, sv.key, sv.version,
                    ch.folder_version_id, fv.folder_id, fv.name, fv.version
             FROM folder_commits fc
             JOIN folder_commit_changes ch ON ch.commit_id = fc.id
             LEFT JOIN secret_versions sv ON sv.id = ch.secret_version_id
             LEFT JOIN folder_versions fv ON fv.id = ch.folder_version_id
             WHERE fc.id=$1
             ORDER BY ch.id",
        )
        .bind(commit_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(change_record_from_row).collect()
    }

    async fn folder_ids_with_commits(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<FolderId>, StoreError> {
        if folder_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = folder_ids.iter().map(|f| f.0).collect();
        let rows = sqlx::query_as::<_, (Uuid,)>(
            "SELECT DISTINCT folder_id FROM folder_commits WHERE folder_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|(id,)| FolderId(id)).collect())
    }

    async fn latest_commits_between(
        &self,
        env_id: &EnvironmentId,
        after_seq: i64,
        upto: DateTime<Utc>,
    ) -> Result<Vec<Commit>, StoreError> {
        let rows = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits
             WHERE seq IN (SELECT MAX(seq) FROM folder_commits
                           WHERE environment_id=$1 AND seq > $2 AND created_at <= $3
                           GROUP BY folder_id)"
        ))
        .bind(env_id.0)
        .bind(after_seq)
        .bind(upto)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(commit_from_row).collect()
    }

    // ───────────────────────────── Bulk (backfill) ─────────────────────────────

    async fn insert_commits(
        &self,
        params: &[CreateCommitParams],
    ) -> Result<Vec<Commit>, StoreError> {
        if params.is_empty() {
            return Ok(vec![]);
        }
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            let id = Uuid::now_v7();
            let (actor_type, metadata) = actor_columns(&p.actor)?;
            let (seq,): (i64,) = sqlx::query_as(
                "INSERT INTO folder_commits(id, folder_id, environment_id, actor_type, actor_metadata, message, created_at)
                 VALUES($1,$2,$3,$4,$5,$6,$7) RETURNING seq",
            )
            .bind(id)
            .bind(p.folder_id.0)
            .bind(p.environment_id.0)
            .bind(&actor_type)
            .bind(&metadata)
            .bind(&p.message)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
            out.push(Commit {
                id: CommitId(id),
                folder_id: p.folder_id,
                environment_id: p.environment_id,
                seq,
                actor: p.actor.clone(),
                message: p.message.clone(),
                created_at: now,
            });
        }
        tx.commit().await.map_err(backend)?;
        Ok(out)
    }

    async fn insert_commit_changes(
        &self,
        rows: &[(CommitId, CommitChange)],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO folder_commit_changes(commit_id, change_type, is_update, secret_version_id, folder_version_id) ",
        );
        qb.push_values(rows, |mut b, (commit_id, change)| {
            let (change_type, is_update, sv, fv) = change_columns(change);
            b.push_bind(commit_id.0)
                .push_bind(change_type)
                .push_bind(is_update)
                .push_bind(sv)
                .push_bind(fv);
        });
        qb.build().execute(&mut *tx).await.map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(rows.len() as u64)
    }

    async fn insert_checkpoints(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<Checkpoint>, StoreError> {
        if commit_ids.is_empty() {
            return Ok(vec![]);
        }
        let commits = self.commits_by_ids(commit_ids).await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut out = Vec::with_capacity(commit_ids.len());
        for commit_id in commit_ids {
            let commit = commits.get(commit_id).ok_or(StoreError::NotFound)?;
            let id = Uuid::now_v7();
            sqlx::query(
                "INSERT INTO folder_checkpoints(id, commit_id, folder_id, created_at) VALUES($1,$2,$3,$4)",
            )
            .bind(id)
            .bind(commit_id.0)
            .bind(commit.folder_id.0)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
            out.push(Checkpoint {
                id: CheckpointId(id),
                folder_id: commit.folder_id,
                commit_id: *commit_id,
                commit_seq: commit.seq,
                created_at: now,
            });
        }
        tx.commit().await.map_err(backend)?;
        Ok(out)
    }

    async fn insert_checkpoint_resources(
        &self,
        rows: &[(CheckpointId, VersionRef)],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO folder_checkpoint_resources(checkpoint_id, secret_version_id, folder_version_id) ",
        );
        qb.push_values(rows, |mut b, (checkpoint_id, version)| {
            let (sv, fv) = match version {
                VersionRef::Secret(id) => (Some(id.0), None),
                VersionRef::Folder(id) => (None, Some(id.0)),
            };
            b.push_bind(checkpoint_id.0).push_bind(sv).push_bind(fv);
        });
        qb.build().execute(&mut *tx).await.map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(rows.len() as u64)
    }

    async fn insert_tree_checkpoints(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<Vec<TreeCheckpoint>, StoreError> {
        if commit_ids.is_empty() {
            return Ok(vec![]);
        }
        let commits = self.commits_by_ids(commit_ids).await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut out = Vec::with_capacity(commit_ids.len());
        for commit_id in commit_ids {
            let commit = commits.get(commit_id).ok_or(StoreError::NotFound)?;
            let id = Uuid::now_v7();
            sqlx::query(
                "INSERT INTO folder_tree_checkpoints(id, commit_id, environment_id, created_at)
                 VALUES($1,$2,$3,$4)",
            )
            .bind(id)
            .bind(commit_id.0)
            .bind(commit.environment_id.0)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
            out.push(TreeCheckpoint {
                id: TreeCheckpointId(id),
                environment_id: commit.environment_id,
                commit_id: *commit_id,
                commit_seq: commit.seq,
                created_at: now,
            });
        }
        tx.commit().await.map_err(backend)?;
        Ok(out)
    }

    async fn insert_tree_checkpoint_resources(
        &self,
        rows: &[(TreeCheckpointId, TreeCheckpointResource)],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO folder_tree_checkpoint_resources(tree_checkpoint_id, folder_id, commit_id) ",
        );
        qb.push_values(rows, |mut b, (tree_checkpoint_id, resource)| {
            b.push_bind(tree_checkpoint_id.0)
                .push_bind(resource.folder_id.0)
                .push_bind(resource.commit_id.map(|c| c.0));
        });
        qb.build().execute(&mut *tx).await.map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(rows.len() as u64)
    }

    async fn delete_platform_commits(&self, message: &str) -> Result<u64, StoreError> {
        let res =
            sqlx::query("DELETE FROM folder_commits WHERE actor_type='platform' AND message=$1")
                .bind(message)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        Ok(res.rows_affected())
    }

    // ───────────────────────────── Checkpoints ─────────────────────────────

    async fn create_checkpoint(
        &self,
        params: &CreateCheckpointParams,
    ) -> Result<Checkpoint, StoreError> {
        let commit = self.get_commit(&params.commit_id).await?;
        let id = Uuid::now_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO folder_checkpoints(id, commit_id, folder_id, created_at) VALUES($1,$2,$3,$4)",
        )
        .bind(id)
        .bind(params.commit_id.0)
        .bind(commit.folder_id.0)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        for version in &params.resources {
            let (sv, fv) = match version {
                VersionRef::Secret(id) => (Some(id.0), None),
                VersionRef::Folder(id) => (None, Some(id.0)),
            };
            sqlx::query(
                "INSERT INTO folder_checkpoint_resources(checkpoint_id, secret_version_id, folder_version_id)
                 VALUES($1,$2,$3)",
            )
            .bind(id)
            .bind(sv)
            .bind(fv)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        Ok(Checkpoint {
            id: CheckpointId(id),
            folder_id: commit.folder_id,
            commit_id: params.commit_id,
            commit_seq: commit.seq,
            created_at: now,
        })
    }

    async fn latest_checkpoint(
        &self,
        folder_id: &FolderId,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT cp.id, cp.folder_id, cp.commit_id, fc.seq, cp.created_at
             FROM folder_checkpoints cp
             JOIN folder_commits fc ON fc.id = cp.commit_id
             WHERE cp.folder_id=$1 ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(folder_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(checkpoint_from_row))
    }

    async fn nearest_checkpoint(
        &self,
        folder_id: &FolderId,
        max_seq: i64,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT cp.id, cp.folder_id, cp.commit_id, fc.seq, cp.created_at
             FROM folder_checkpoints cp
             JOIN folder_commits fc ON fc.id = cp.commit_id
             WHERE cp.folder_id=$1 AND fc.seq <= $2 ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(folder_id.0)
        .bind(max_seq)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(checkpoint_from_row))
    }

    async fn checkpoints_for_folder(
        &self,
        folder_id: &FolderId,
        limit: Option<u32>,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        let rows = sqlx::query_as::<_, CheckpointRow>(
            "SELECT cp.id, cp.folder_id, cp.commit_id, fc.seq, cp.created_at
             FROM folder_checkpoints cp
             JOIN folder_commits fc ON fc.id = cp.commit_id
             WHERE cp.folder_id=$1 ORDER BY fc.seq DESC LIMIT $2",
        )
        .bind(folder_id.0)
        .bind(limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(checkpoint_from_row).collect())
    }

    async fn checkpoint_resources(
        &self,
        checkpoint_id: &CheckpointId,
    ) -> Result<Vec<ResourceState>, StoreError> {
        let rows = sqlx::query_as::<_, StateRow>(
            "SELECT r.secret_version_id, sv.secret_id, sv.key, sv.version,
                    r.folder_version_id, fv.folder_id, fv.name, fv.version
             FROM folder_checkpoint_resources r
             LEFT JOIN secret_versions sv ON sv.id = r.secret_version_id
             LEFT JOIN folder_versions fv ON fv.id = r.folder_version_id
             WHERE r.checkpoint_id=$1 ORDER BY r.id",
        )
        .bind(checkpoint_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(state_from_row).collect()
    }

    // ───────────────────────────── Tree checkpoints ─────────────────────────────

    async fn create_tree_checkpoint(
        &self,
        params: &CreateTreeCheckpointParams,
    ) -> Result<TreeCheckpoint, StoreError> {
        let commit = self.get_commit(&params.commit_id).await?;
        let id = Uuid::now_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO folder_tree_checkpoints(id, commit_id, environment_id, created_at)
             VALUES($1,$2,$3,$4)",
        )
        .bind(id)
        .bind(params.commit_id.0)
        .bind(commit.environment_id.0)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_or_backend)?;

        for resource in &params.resources {
            sqlx::query(
                "INSERT INTO folder_tree_checkpoint_resources(tree_checkpoint_id, folder_id, commit_id)
                 VALUES($1,$2,$3)",
            )
            .bind(id)
            .bind(resource.folder_id.0)
            .bind(resource.commit_id.map(|c| c.0))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        Ok(TreeCheckpoint {
            id: TreeCheckpointId(id),
            environment_id: commit.environment_id,
            commit_id: params.commit_id,
            commit_seq: commit.seq,
            created_at: now,
        })
    }

    async fn latest_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Option<TreeCheckpoint>, StoreError> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT tcp.id, tcp.environment_id, tcp.commit_id, fc.seq, tcp.created_at
             FROM folder_tree_checkpoints tcp
             JOIN folder_commits fc ON fc.id = tcp.commit_id
             WHERE tcp.environment_id=$1 ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(env_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(tree_checkpoint_from_row))
    }

    async fn nearest_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
        at: DateTime<Utc>,
    ) -> Result<Option<TreeCheckpoint>, StoreError> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT tcp.id, tcp.environment_id, tcp.commit_id, fc.seq, tcp.created_at
             FROM folder_tree_checkpoints tcp
             JOIN folder_commits fc ON fc.id = tcp.commit_id
             WHERE tcp.environment_id=$1 AND fc.created_at <= $2
             ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(env_id.0)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(tree_checkpoint_from_row))
    }

    async fn tree_checkpoint_resources(
        &self,
        tree_checkpoint_id: &TreeCheckpointId,
    ) -> Result<Vec<TreeCheckpointResource>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            "SELECT folder_id, commit_id FROM folder_tree_checkpoint_resources
             WHERE tree_checkpoint_id=$1 ORDER BY id",
        )
        .bind(tree_checkpoint_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|(folder_id, commit_id)| TreeCheckpointResource {
                folder_id: FolderId(folder_id),
                commit_id: commit_id.map(CommitId),
            })
            .collect())
    }
}

impl PostgresStore {
    async fn commits_by_ids(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<std::collections::HashMap<CommitId, Commit>, StoreError> {
        let ids: Vec<Uuid> = commit_ids.iter().map(|c| c.0).collect();
        let rows = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut out = std::collections::HashMap::with_capacity(rows.len());
        for row in rows {
            let commit = commit_from_row(row)?;
            out.insert(commit.id, commit);
        }
        Ok(out)
    }
}
