//! Folder and folder version types.
//!
//! Folders are mutable containers owned by the CRUD layer; every mutation
//! writes an immutable `FolderVersion` row that the commit log points at.
//! Version rows outlive the folder so history survives deletion.

use chrono::{DateTime, Utc};

use super::{EnvironmentId, FolderId, FolderVersionId};

/// Folder record (live tree node)
#[derive(Clone, Debug)]
pub struct Folder {
    pub id: FolderId,
    pub environment_id: EnvironmentId,
    /// None for the environment root.
    pub parent_id: Option<FolderId>,
    pub name: String,
    /// Monotonically increasing per-folder version counter.
    pub version: i64,
    /// Reserved folders are internal and never versioned.
    pub is_reserved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of one folder mutation
#[derive(Clone, Debug)]
pub struct FolderVersion {
    pub id: FolderVersionId,
    pub folder_id: FolderId,
    pub version: i64,
    pub name: String,
    pub parent_id: Option<FolderId>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a folder
#[derive(Clone, Debug)]
pub struct CreateFolderParams {
    pub environment_id: EnvironmentId,
    pub parent_id: Option<FolderId>,
    pub name: String,
    pub is_reserved: bool,
}

/// Parameters for mutating a folder (bumps the version counter)
#[derive(Clone, Debug)]
pub struct UpdateFolderParams {
    pub folder_id: FolderId,
    pub name: String,
    pub parent_id: Option<FolderId>,
}
