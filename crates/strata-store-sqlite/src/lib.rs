//! SQLite backend for the strata versioning engine.
//!
//! UUIDs are stored as TEXT, timestamps as INTEGER microseconds. All
//! multi-row writes run inside a single transaction.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use strata_storage::types::*;
use strata_storage::{PitStore, StoreError};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const COMMIT_COLS: &str =
    "id, seq, folder_id, environment_id, actor_type, actor_metadata, message, created_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
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

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn ts(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn from_ts(v: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(v).unwrap_or_default()
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
fn change_columns(change: &CommitChange) -> (String, i64, Option<String>, Option<String>) {
    let (sv, fv) = match change.version_ref() {
        VersionRef::Secret(id) => (Some(id.0.to_string()), None),
        VersionRef::Folder(id) => (None, Some(id.0.to_string())),
    };
    (change.op().to_string(), change.is_update() as i64, sv, fv)
}

type CommitRow = (
    String,         // id
    i64,            // seq
    String,         // folder_id
    String,         // environment_id
    String,         // actor_type
    Option<String>, // actor_metadata
    Option<String>, // message
    i64,            // created_at
);

fn commit_from_row(row: CommitRow) -> Result<Commit, StoreError> {
    let (id, seq, folder_id, environment_id, actor_type, metadata, message, created_at) = row;
    Ok(Commit {
        id: CommitId(parse_uuid(&id)?),
        folder_id: FolderId(parse_uuid(&folder_id)?),
        environment_id: EnvironmentId(parse_uuid(&environment_id)?),
        seq,
        actor: actor_from_columns(&actor_type, metadata.as_deref())?,
        message,
        created_at: from_ts(created_at),
    })
}

type FolderRow = (
    String,         // id
    String,         // environment_id
    Option<String>, // parent_id
    String,         // name
    i64,            // version
    i64,            // is_reserved
    i64,            // created_at
    i64,            // updated_at
);

fn folder_from_row(row: FolderRow) -> Result<Folder, StoreError> {
    let (id, env, parent, name, version, is_reserved, created_at, updated_at) = row;
    let parent_id = match parent {
        Some(p) => Some(FolderId(parse_uuid(&p)?)),
        None => None,
    };
    Ok(Folder {
        id: FolderId(parse_uuid(&id)?),
        environment_id: EnvironmentId(parse_uuid(&env)?),
        parent_id,
        name,
        version,
        is_reserved: is_reserved != 0,
        created_at: from_ts(created_at),
        updated_at: from_ts(updated_at),
    })
}

/// One side of a LEFT-joined version row pair
/// (secret_version_id, secret_id, key, secret version,
///  folder_version_id, folder_id, name, folder version).
type StateRow = (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
);

/// Change row joined with its commit: (commit_id, seq, change_type, StateRow...).
type ChangeRow = (
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
);

fn change_record_from_row(row: ChangeRow) -> Result<ChangeRecord, StoreError> {
    let (commit_id, seq, change_type, a, b, c, d, e, f, g, h) = row;
    Ok(ChangeRecord {
        commit_id: CommitId(parse_uuid(&commit_id)?),
        seq,
        op: change_type.parse().map_err(StoreError::Backend)?,
        state: state_from_row((a, b, c, d, e, f, g, h))?,
    })
}

fn state_from_row(row: StateRow) -> Result<ResourceState, StoreError> {
    match row {
        (Some(vid), Some(sid), Some(key), Some(version), ..) => {
            Ok(ResourceState::Secret(SecretState {
                secret_id: SecretId(parse_uuid(&sid)?),
                version_id: SecretVersionId(parse_uuid(&vid)?),
                key,
                version,
            }))
        }
        (None, None, None, None, Some(vid), Some(fid), Some(name), Some(version)) => {
            Ok(ResourceState::Folder(FolderState {
                folder_id: FolderId(parse_uuid(&fid)?),
                version_id: FolderVersionId(parse_uuid(&vid)?),
                name,
                version,
            }))
        }
        _ => Err(StoreError::Backend("change row resolves to no version".into())),
    }
}

#[async_trait::async_trait]
impl PitStore for SqliteStore {
    // ───────────────────────────── Projects / Environments ─────────────────────────────

    async fn create_project(&self, params: &CreateProjectParams) -> Result<ProjectId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO projects(id, name, created_at) VALUES(?,?,?)")
            .bind(id.to_string())
            .bind(&params.name)
            .bind(ts(Utc::now()))
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
        sqlx::query("INSERT INTO environments(id, project_id, name, created_at) VALUES(?,?,?,?)")
            .bind(id.to_string())
            .bind(params.project_id.0.to_string())
            .bind(&params.name)
            .bind(ts(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(EnvironmentId(id))
    }

    async fn get_environment(&self, env_id: &EnvironmentId) -> Result<Environment, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT id, project_id, name, created_at FROM environments WHERE id=?",
        )
        .bind(env_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((id, project_id, name, created_at)) => Ok(Environment {
                id: EnvironmentId(parse_uuid(&id)?),
                project_id: ProjectId(parse_uuid(&project_id)?),
                name,
                created_at: from_ts(created_at),
            }),
        }
    }

    async fn list_project_ids(&self) -> Result<Vec<ProjectId>, StoreError> {
        let rows =
            sqlx::query_as::<_, (String,)>("SELECT id FROM projects ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        let mut out = Vec::with_capacity(rows.len());
        for (id,) in rows {
            out.push(ProjectId(parse_uuid(&id)?));
        }
        Ok(out)
    }

    // ───────────────────────────── Folders ─────────────────────────────

    async fn create_folder(
        &self,
        params: &CreateFolderParams,
    ) -> Result<(FolderId, FolderVersionId), StoreError> {
        let folder_id = Uuid::now_v7();
        let version_id = Uuid::now_v7();
        let now = ts(Utc::now());
        let parent = params.parent_id.map(|p| p.0.to_string());

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO folders(id, environment_id, parent_id, name, version, is_reserved, created_at, updated_at)
             VALUES(?,?,?,?,1,?,?,?)",
        )
        .bind(folder_id.to_string())
        .bind(params.environment_id.0.to_string())
        .bind(&parent)
        .bind(&params.name)
        .bind(params.is_reserved as i64)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query(
            "INSERT INTO folder_versions(id, folder_id, version, name, parent_id, created_at)
             VALUES(?,?,1,?,?,?)",
        )
        .bind(version_id.to_string())
        .bind(folder_id.to_string())
        .bind(&params.name)
        .bind(&parent)
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
        let now = ts(Utc::now());
        let version_id = Uuid::now_v7();
        let parent = params.parent_id.map(|p| p.0.to_string());

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let version: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM folders WHERE id=?")
                .bind(params.folder_id.0.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
        let version = version.ok_or(StoreError::NotFound)?.0 + 1;

        sqlx::query("UPDATE folders SET name=?, parent_id=?, version=?, updated_at=? WHERE id=?")
            .bind(&params.name)
            .bind(&parent)
            .bind(version)
            .bind(now)
            .bind(params.folder_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "INSERT INTO folder_versions(id, folder_id, version, name, parent_id, created_at)
             VALUES(?,?,?,?,?,?)",
        )
        .bind(version_id.to_string())
        .bind(params.folder_id.0.to_string())
        .bind(version)
        .bind(&params.name)
        .bind(&parent)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok(FolderVersionId(version_id))
    }

    async fn delete_folder(&self, folder_id: &FolderId) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM folders WHERE id=?")
            .bind(folder_id.0.to_string())
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
             FROM folders WHERE id=?",
        )
        .bind(folder_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => folder_from_row(row),
        }
    }

    async fn list_folders_by_env(
        &self,
        env_id: &EnvironmentId,
    ) -> Result<Vec<Folder>, StoreError> {
        let rows = sqlx::query_as::<_, FolderRow>(
            "SELECT id, environment_id, parent_id, name, version, is_reserved, created_at, updated_at
             FROM folders WHERE environment_id=? ORDER BY created_at, id",
        )
        .bind(env_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(folder_from_row).collect()
    }

    async fn list_folders_for_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Folder>, StoreError> {
        if project_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT f.id, f.environment_id, f.parent_id, f.name, f.version, f.is_reserved, f.created_at, f.updated_at
             FROM folders f
             JOIN environments e ON e.id = f.environment_id
             WHERE e.project_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in project_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(") ORDER BY f.created_at, f.id");
        let rows = qb
            .build_query_as::<FolderRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(folder_from_row).collect()
    }

    async fn latest_folder_versions(
        &self,
        folder_ids: &[FolderId],
    ) -> Result<Vec<FolderVersion>, StoreError> {
        if folder_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT fv.id, fv.folder_id, fv.version, fv.name, fv.parent_id, fv.created_at
             FROM folder_versions fv
             JOIN (SELECT folder_id, MAX(version) AS v FROM folder_versions WHERE folder_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in folder_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(") GROUP BY folder_id) m ON m.folder_id = fv.folder_id AND m.v = fv.version");
        let rows = qb
            .build_query_as::<(String, String, i64, String, Option<String>, i64)>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, folder_id, version, name, parent, created_at) in rows {
            let parent_id = match parent {
                Some(p) => Some(FolderId(parse_uuid(&p)?)),
                None => None,
            };
            out.push(FolderVersion {
                id: FolderVersionId(parse_uuid(&id)?),
                folder_id: FolderId(parse_uuid(&folder_id)?),
                version,
                name,
                parent_id,
                created_at: from_ts(created_at),
            });
        }
        Ok(out)
    }

    async fn folder_version_owners(
        &self,
        version_ids: &[FolderVersionId],
    ) -> Result<Vec<(FolderVersionId, FolderId)>, StoreError> {
        if version_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT id, folder_id FROM folder_versions WHERE id IN (");
        let mut sep = qb.separated(", ");
        for id in version_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(")");
        let rows = qb
            .build_query_as::<(String, String)>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let mut out = Vec::with_capacity(rows.len());
        for (vid, fid) in rows {
            out.push((
                FolderVersionId(parse_uuid(&vid)?),
                FolderId(parse_uuid(&fid)?),
            ));
        }
        Ok(out)
    }

    // ───────────────────────────── Secrets ─────────────────────────────

    async fn create_secret(
        &self,
        params: &CreateSecretParams,
    ) -> Result<(SecretId, SecretVersionId), StoreError> {
        let secret_id = Uuid::now_v7();
        let version_id = Uuid::now_v7();
        let now = ts(Utc::now());

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO secrets(id, folder_id, key, version, created_at, updated_at)
             VALUES(?,?,?,1,?,?)",
        )
        .bind(secret_id.to_string())
        .bind(params.folder_id.0.to_string())
        .bind(&params.key)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        sqlx::query(
            "INSERT INTO secret_versions(id, secret_id, folder_id, version, key, encrypted_value, created_at)
             VALUES(?,?,?,1,?,?,?)",
        )
        .bind(version_id.to_string())
        .bind(secret_id.to_string())
        .bind(params.folder_id.0.to_string())
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
        let now = ts(Utc::now());
        let version_id = Uuid::now_v7();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let row: Option<(String, String, i64)> =
            sqlx::query_as("SELECT folder_id, key, version FROM secrets WHERE id=?")
                .bind(params.secret_id.0.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
        let (folder_id, key, version) = row.ok_or(StoreError::NotFound)?;
        let version = version + 1;

        sqlx::query("UPDATE secrets SET version=?, updated_at=? WHERE id=?")
            .bind(version)
            .bind(now)
            .bind(params.secret_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "INSERT INTO secret_versions(id, secret_id, folder_id, version, key, encrypted_value, created_at)
             VALUES(?,?,?,?,?,?,?)",
        )
        .bind(version_id.to_string())
        .bind(params.secret_id.0.to_string())
        .bind(&folder_id)
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
        let res = sqlx::query("DELETE FROM secrets WHERE id=?")
            .bind(secret_id.0.to_string())
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
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT sv.id, sv.secret_id, sv.folder_id, sv.version, sv.key, sv.encrypted_value, sv.created_at
             FROM secret_versions sv
             JOIN secrets s ON s.id = sv.secret_id AND s.version = sv.version
             WHERE s.folder_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in folder_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(") ORDER BY sv.created_at, sv.id");
        let rows = qb
            .build_query_as::<(String, String, String, i64, String, Vec<u8>, i64)>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, secret_id, folder_id, version, key, encrypted_value, created_at) in rows {
            out.push(SecretVersion {
                id: SecretVersionId(parse_uuid(&id)?),
                secret_id: SecretId(parse_uuid(&secret_id)?),
                folder_id: FolderId(parse_uuid(&folder_id)?),
                version,
                key,
                encrypted_value,
                created_at: from_ts(created_at),
            });
        }
        Ok(out)
    }

    async fn secret_version_owners(
        &self,
        version_ids: &[SecretVersionId],
    ) -> Result<Vec<(SecretVersionId, SecretId)>, StoreError> {
        if version_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT id, secret_id FROM secret_versions WHERE id IN (");
        let mut sep = qb.separated(", ");
        for id in version_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(")");
        let rows = qb
            .build_query_as::<(String, String)>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let mut out = Vec::with_capacity(rows.len());
        for (vid, sid) in rows {
            out.push((
                SecretVersionId(parse_uuid(&vid)?),
                SecretId(parse_uuid(&sid)?),
            ));
        }
        Ok(out)
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
        let (max_seq,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(seq), 0) FROM folder_commits")
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
        let seq = max_seq + 1;

        sqlx::query(&format!(
            "INSERT INTO folder_commits({COMMIT_COLS}) VALUES(?,?,?,?,?,?,?,?)"
        ))
        .bind(id.to_string())
        .bind(seq)
        .bind(params.folder_id.0.to_string())
        .bind(params.environment_id.0.to_string())
        .bind(&actor_type)
        .bind(&metadata)
        .bind(&params.message)
        .bind(ts(now))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for change in changes {
            let (change_type, is_update, sv, fv) = change_columns(change);
            sqlx::query(
                "INSERT INTO folder_commit_changes(commit_id, change_type, is_update, secret_version_id, folder_version_id)
                 VALUES(?,?,?,?,?)",
            )
            .bind(id.to_string())
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
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE id=?"
        ))
        .bind(commit_id.0.to_string())
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
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE folder_id=? ORDER BY seq DESC LIMIT 1"
        ))
        .bind(folder_id.0.to_string())
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
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE environment_id=? ORDER BY seq DESC LIMIT 1"
        ))
        .bind(env_id.0.to_string())
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
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COMMIT_COLS} FROM folder_commits
             WHERE seq IN (SELECT MAX(seq) FROM folder_commits WHERE folder_id IN ("
        ));
        let mut sep = qb.separated(", ");
        for id in folder_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(")");
        if let Some(max) = max_seq {
            qb.push(" AND seq <= ");
            qb.push_bind(max);
        }
        qb.push(" GROUP BY folder_id)");
        let rows = qb
            .build_query_as::<CommitRow>()
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
             WHERE folder_id=? AND created_at <= ? ORDER BY seq DESC LIMIT 1"
        ))
        .bind(folder_id.0.to_string())
        .bind(ts(at))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(commit_from_row).transpose()
    }

    async fn commits_for_folder(&self, folder_id: &FolderId) -> Result<Vec<Commit>, StoreError> {
        let rows = sqlx::query_as::<_, CommitRow>(&format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE folder_id=? ORDER BY seq DESC"
        ))
        .bind(folder_id.0.to_string())
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
            "SELECT COUNT(*) FROM folder_commits WHERE folder_id=? AND seq > ?",
        )
        .bind(folder_id.0.to_string())
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
            "SELECT COUNT(*) FROM folder_commits WHERE environment_id=? AND seq > ?",
        )
        .bind(env_id.0.to_string())
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
             WHERE fc.folder_id=? AND fc.seq > ? AND fc.seq <= ?
             ORDER BY fc.seq, ch.id",
        )
        .bind(folder_id.0.to_string())
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
             WHERE fc.id=?
             ORDER BY ch.id",
        )
        .bind(commit_id.0.to_string())
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
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT DISTINCT folder_id FROM folder_commits WHERE folder_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in folder_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(")");
        let rows = qb
            .build_query_as::<(String,)>()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let mut out = Vec::with_capacity(rows.len());
        for (id,) in rows {
            out.push(FolderId(parse_uuid(&id)?));
        }
        Ok(out)
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
                           WHERE environment_id=? AND seq > ? AND created_at <= ?
                           GROUP BY folder_id)"
        ))
        .bind(env_id.0.to_string())
        .bind(after_seq)
        .bind(ts(upto))
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
        let (max_seq,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(seq), 0) FROM folder_commits")
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;

        let mut out = Vec::with_capacity(params.len());
        for (i, p) in params.iter().enumerate() {
            let id = Uuid::now_v7();
            let seq = max_seq + 1 + i as i64;
            let (actor_type, metadata) = actor_columns(&p.actor)?;
            sqlx::query(&format!(
                "INSERT INTO folder_commits({COMMIT_COLS}) VALUES(?,?,?,?,?,?,?,?)"
            ))
            .bind(id.to_string())
            .bind(seq)
            .bind(p.folder_id.0.to_string())
            .bind(p.environment_id.0.to_string())
            .bind(&actor_type)
            .bind(&metadata)
            .bind(&p.message)
            .bind(ts(now))
            .execute(&mut *tx)
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
        for (commit_id, change) in rows {
            let (change_type, is_update, sv, fv) = change_columns(change);
            sqlx::query(
                "INSERT INTO folder_commit_changes(commit_id, change_type, is_update, secret_version_id, folder_version_id)
                 VALUES(?,?,?,?,?)",
            )
            .bind(commit_id.0.to_string())
            .bind(change_type)
            .bind(is_update)
            .bind(sv)
            .bind(fv)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
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
                "INSERT INTO folder_checkpoints(id, commit_id, folder_id, created_at) VALUES(?,?,?,?)",
            )
            .bind(id.to_string())
            .bind(commit_id.0.to_string())
            .bind(commit.folder_id.0.to_string())
            .bind(ts(now))
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
        for (checkpoint_id, version) in rows {
            let (sv, fv) = match version {
                VersionRef::Secret(id) => (Some(id.0.to_string()), None),
                VersionRef::Folder(id) => (None, Some(id.0.to_string())),
            };
            sqlx::query(
                "INSERT INTO folder_checkpoint_resources(checkpoint_id, secret_version_id, folder_version_id)
                 VALUES(?,?,?)",
            )
            .bind(checkpoint_id.0.to_string())
            .bind(sv)
            .bind(fv)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
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
                 VALUES(?,?,?,?)",
            )
            .bind(id.to_string())
            .bind(commit_id.0.to_string())
            .bind(commit.environment_id.0.to_string())
            .bind(ts(now))
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
        for (tree_checkpoint_id, resource) in rows {
            sqlx::query(
                "INSERT INTO folder_tree_checkpoint_resources(tree_checkpoint_id, folder_id, commit_id)
                 VALUES(?,?,?)",
            )
            .bind(tree_checkpoint_id.0.to_string())
            .bind(resource.folder_id.0.to_string())
            .bind(resource.commit_id.map(|c| c.0.to_string()))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(rows.len() as u64)
    }

    async fn delete_platform_commits(&self, message: &str) -> Result<u64, StoreError> {
        let res =
            sqlx::query("DELETE FROM folder_commits WHERE actor_type='platform' AND message=?")
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
            "INSERT INTO folder_checkpoints(id, commit_id, folder_id, created_at) VALUES(?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.commit_id.0.to_string())
        .bind(commit.folder_id.0.to_string())
        .bind(ts(now))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        for version in &params.resources {
            let (sv, fv) = match version {
                VersionRef::Secret(id) => (Some(id.0.to_string()), None),
                VersionRef::Folder(id) => (None, Some(id.0.to_string())),
            };
            sqlx::query(
                "INSERT INTO folder_checkpoint_resources(checkpoint_id, secret_version_id, folder_version_id)
                 VALUES(?,?,?)",
            )
            .bind(id.to_string())
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
        let row = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT cp.id, cp.folder_id, cp.commit_id, fc.seq, cp.created_at
             FROM folder_checkpoints cp
             JOIN folder_commits fc ON fc.id = cp.commit_id
             WHERE cp.folder_id=? ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(folder_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(checkpoint_from_row).transpose()
    }

    async fn nearest_checkpoint(
        &self,
        folder_id: &FolderId,
        max_seq: i64,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT cp.id, cp.folder_id, cp.commit_id, fc.seq, cp.created_at
             FROM folder_checkpoints cp
             JOIN folder_commits fc ON fc.id = cp.commit_id
             WHERE cp.folder_id=? AND fc.seq <= ? ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(folder_id.0.to_string())
        .bind(max_seq)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(checkpoint_from_row).transpose()
    }

    async fn checkpoints_for_folder(
        &self,
        folder_id: &FolderId,
        limit: Option<u32>,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT cp.id, cp.folder_id, cp.commit_id, fc.seq, cp.created_at
             FROM folder_checkpoints cp
             JOIN folder_commits fc ON fc.id = cp.commit_id
             WHERE cp.folder_id=? ORDER BY fc.seq DESC LIMIT ?",
        )
        .bind(folder_id.0.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(checkpoint_from_row).collect()
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
             WHERE r.checkpoint_id=? ORDER BY r.id",
        )
        .bind(checkpoint_id.0.to_string())
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
             VALUES(?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.commit_id.0.to_string())
        .bind(commit.environment_id.0.to_string())
        .bind(ts(now))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        for resource in &params.resources {
            sqlx::query(
                "INSERT INTO folder_tree_checkpoint_resources(tree_checkpoint_id, folder_id, commit_id)
                 VALUES(?,?,?)",
            )
            .bind(id.to_string())
            .bind(resource.folder_id.0.to_string())
            .bind(resource.commit_id.map(|c| c.0.to_string()))
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
        let row = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT tcp.id, tcp.environment_id, tcp.commit_id, fc.seq, tcp.created_at
             FROM folder_tree_checkpoints tcp
             JOIN folder_commits fc ON fc.id = tcp.commit_id
             WHERE tcp.environment_id=? ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(env_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(tree_checkpoint_from_row).transpose()
    }

    async fn nearest_tree_checkpoint(
        &self,
        env_id: &EnvironmentId,
        at: DateTime<Utc>,
    ) -> Result<Option<TreeCheckpoint>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT tcp.id, tcp.environment_id, tcp.commit_id, fc.seq, tcp.created_at
             FROM folder_tree_checkpoints tcp
             JOIN folder_commits fc ON fc.id = tcp.commit_id
             WHERE tcp.environment_id=? AND fc.created_at <= ?
             ORDER BY fc.seq DESC LIMIT 1",
        )
        .bind(env_id.0.to_string())
        .bind(ts(at))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(tree_checkpoint_from_row).transpose()
    }

    async fn tree_checkpoint_resources(
        &self,
        tree_checkpoint_id: &TreeCheckpointId,
    ) -> Result<Vec<TreeCheckpointResource>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT folder_id, commit_id FROM folder_tree_checkpoint_resources
             WHERE tree_checkpoint_id=? ORDER BY id",
        )
        .bind(tree_checkpoint_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (folder_id, commit_id) in rows {
            let commit_id = match commit_id {
                Some(c) => Some(CommitId(parse_uuid(&c)?)),
                None => None,
            };
            out.push(TreeCheckpointResource {
                folder_id: FolderId(parse_uuid(&folder_id)?),
                commit_id,
            });
        }
        Ok(out)
    }
}

impl SqliteStore {
    async fn commits_by_ids(
        &self,
        commit_ids: &[CommitId],
    ) -> Result<std::collections::HashMap<CommitId, Commit>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COMMIT_COLS} FROM folder_commits WHERE id IN ("
        ));
        let mut sep = qb.separated(", ");
        for id in commit_ids {
            sep.push_bind(id.0.to_string());
        }
        qb.push(")");
        let rows = qb
            .build_query_as::<CommitRow>()
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

fn checkpoint_from_row(row: (String, String, String, i64, i64)) -> Result<Checkpoint, StoreError> {
    let (id, folder_id, commit_id, seq, created_at) = row;
    Ok(Checkpoint {
        id: CheckpointId(parse_uuid(&id)?),
        folder_id: FolderId(parse_uuid(&folder_id)?),
        commit_id: CommitId(parse_uuid(&commit_id)?),
        commit_seq: seq,
        created_at: from_ts(created_at),
    })
}

fn tree_checkpoint_from_row(
    row: (String, String, String, i64, i64),
) -> Result<TreeCheckpoint, StoreError> {
    let (id, environment_id, commit_id, seq, created_at) = row;
    Ok(TreeCheckpoint {
        id: TreeCheckpointId(parse_uuid(&id)?),
        environment_id: EnvironmentId(parse_uuid(&environment_id)?),
        commit_id: CommitId(parse_uuid(&commit_id)?),
        commit_seq: seq,
        created_at: from_ts(created_at),
    })
}
