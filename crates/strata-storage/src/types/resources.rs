//! Resolved resource shapes returned by reads.
//!
//! Version rows are joined back to their owning resource so replay can key
//! changes by resource identity rather than by version id.

use super::{
    ChangeOp, CommitId, FolderId, FolderVersionId, SecretId, SecretVersionId, VersionRef,
};

/// Identity of the underlying resource behind a version row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Folder(FolderId),
    Secret(SecretId),
}

/// Resolved folder version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderState {
    pub folder_id: FolderId,
    pub version_id: FolderVersionId,
    pub name: String,
    pub version: i64,
}

/// Resolved secret version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretState {
    pub secret_id: SecretId,
    pub version_id: SecretVersionId,
    pub key: String,
    pub version: i64,
}

/// One resource as it stood at some point in history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Folder(FolderState),
    Secret(SecretState),
}

impl ResourceState {
    pub fn identity(&self) -> ResourceKey {
        match self {
            ResourceState::Folder(f) => ResourceKey::Folder(f.folder_id),
            ResourceState::Secret(s) => ResourceKey::Secret(s.secret_id),
        }
    }

    pub fn version_ref(&self) -> VersionRef {
        match self {
            ResourceState::Folder(f) => VersionRef::Folder(f.version_id),
            ResourceState::Secret(s) => VersionRef::Secret(s.version_id),
        }
    }

    /// Version counter of the underlying resource at this state.
    pub fn version(&self) -> i64 {
        match self {
            ResourceState::Folder(f) => f.version,
            ResourceState::Secret(s) => s.version,
        }
    }
}

/// One change row joined with its commit and resolved version.
#[derive(Clone, Debug)]
pub struct ChangeRecord {
    pub commit_id: CommitId,
    pub seq: i64,
    pub op: ChangeOp,
    pub state: ResourceState,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_identity_ignores_version() {
        let secret_id = SecretId(Uuid::new_v4());
        let v1 = ResourceState::Secret(SecretState {
            secret_id,
            version_id: SecretVersionId(Uuid::new_v4()),
            key: "DB_URL".into(),
            version: 1,
        });
        let v2 = ResourceState::Secret(SecretState {
            secret_id,
            version_id: SecretVersionId(Uuid::new_v4()),
            key: "DB_URL".into(),
            version: 2,
        });
        assert_eq!(v1.identity(), v2.identity());
        assert_ne!(v1.version_ref(), v2.version_ref());
    }
}
