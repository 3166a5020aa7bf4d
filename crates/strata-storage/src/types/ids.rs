//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// Project identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub Uuid);

/// Environment identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(pub Uuid);

/// Folder identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderId(pub Uuid);

/// Folder version identifier (immutable snapshot row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderVersionId(pub Uuid);

/// Secret identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretId(pub Uuid);

/// Secret version identifier (immutable snapshot row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretVersionId(pub Uuid);

/// Commit identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub Uuid);

/// Checkpoint identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointId(pub Uuid);

/// Tree checkpoint identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeCheckpointId(pub Uuid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_id_debug() {
        let uuid = Uuid::new_v4();
        let folder_id = FolderId(uuid);
        assert!(format!("{:?}", folder_id).contains(&uuid.to_string()));
    }

    #[test]
    fn test_typed_ids_equality() {
        let uuid = Uuid::new_v4();
        assert_eq!(CommitId(uuid), CommitId(uuid));
        assert_ne!(CommitId(uuid), CommitId(Uuid::new_v4()));
    }

    #[test]
    fn test_typed_ids_hash() {
        use std::collections::HashSet;

        let uuid = Uuid::new_v4();
        let mut set = HashSet::new();
        set.insert(SecretId(uuid));
        assert!(set.contains(&SecretId(uuid)));
    }

    #[test]
    fn test_typed_ids_inner_access() {
        let uuid = Uuid::new_v4();
        assert_eq!(FolderVersionId(uuid).0, uuid);
        assert_eq!(SecretVersionId(uuid).0, uuid);
        assert_eq!(TreeCheckpointId(uuid).0, uuid);
    }
}
