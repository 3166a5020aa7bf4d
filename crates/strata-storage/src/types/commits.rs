//! Commit log types.
//!
//! A commit is an ordered, immutable record of one mutation batch against a
//! single folder. Ordering is the store-assigned global `seq`; the UUID id is
//! for external reference only.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CommitId, EnvironmentId, FolderId, FolderVersionId, SecretVersionId};

/// Kind of principal that produced a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    Identity,
    Platform,
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActorType::User => "user",
            ActorType::Identity => "identity",
            ActorType::Platform => "platform",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ActorType::User),
            "identity" => Ok(ActorType::Identity),
            "platform" => Ok(ActorType::Platform),
            other => Err(format!("unknown actor type: {other}")),
        }
    }
}

/// Free-form attribution carried alongside the actor type, stored as JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Commit attribution.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    pub actor_type: ActorType,
    pub metadata: ActorMetadata,
}

impl Actor {
    /// System-generated commits (backfill, migrations).
    pub fn platform() -> Self {
        Actor {
            actor_type: ActorType::Platform,
            metadata: ActorMetadata::default(),
        }
    }

    pub fn user(id: Uuid) -> Self {
        Actor {
            actor_type: ActorType::User,
            metadata: ActorMetadata {
                id: Some(id),
                name: None,
            },
        }
    }

    pub fn identity(id: Uuid) -> Self {
        Actor {
            actor_type: ActorType::Identity,
            metadata: ActorMetadata {
                id: Some(id),
                name: None,
            },
        }
    }
}

/// Operation recorded by a commit change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Add,
    Update,
    Delete,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeOp::Add => "add",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ChangeOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ChangeOp::Add),
            "update" => Ok(ChangeOp::Update),
            "delete" => Ok(ChangeOp::Delete),
            other => Err(format!("unknown change op: {other}")),
        }
    }
}

/// Reference to exactly one immutable version row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionRef {
    Folder(FolderVersionId),
    Secret(SecretVersionId),
}

/// One entry of a commit's change set.
///
/// The variant carries the version reference, so a change can never point at
/// both a folder version and a secret version, or at neither.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitChange {
    FolderAdd(FolderVersionId),
    FolderUpdate(FolderVersionId),
    FolderDelete(FolderVersionId),
    SecretAdd(SecretVersionId),
    SecretUpdate(SecretVersionId),
    SecretDelete(SecretVersionId),
}

impl CommitChange {
    pub fn op(&self) -> ChangeOp {
        match self {
            CommitChange::FolderAdd(_) | CommitChange::SecretAdd(_) => ChangeOp::Add,
            CommitChange::FolderUpdate(_) | CommitChange::SecretUpdate(_) => ChangeOp::Update,
            CommitChange::FolderDelete(_) | CommitChange::SecretDelete(_) => ChangeOp::Delete,
        }
    }

    pub fn version_ref(&self) -> VersionRef {
        match *self {
            CommitChange::FolderAdd(id)
            | CommitChange::FolderUpdate(id)
            | CommitChange::FolderDelete(id) => VersionRef::Folder(id),
            CommitChange::SecretAdd(id)
            | CommitChange::SecretUpdate(id)
            | CommitChange::SecretDelete(id) => VersionRef::Secret(id),
        }
    }

    /// Storage-level flag paired with the persisted change type.
    pub fn is_update(&self) -> bool {
        self.op() == ChangeOp::Update
    }

    /// Rebuilds a change from its persisted `(op, version ref)` pair.
    pub fn from_parts(op: ChangeOp, version: VersionRef) -> Self {
        match (op, version) {
            (ChangeOp::Add, VersionRef::Folder(id)) => CommitChange::FolderAdd(id),
            (ChangeOp::Update, VersionRef::Folder(id)) => CommitChange::FolderUpdate(id),
            (ChangeOp::Delete, VersionRef::Folder(id)) => CommitChange::FolderDelete(id),
            (ChangeOp::Add, VersionRef::Secret(id)) => CommitChange::SecretAdd(id),
            (ChangeOp::Update, VersionRef::Secret(id)) => CommitChange::SecretUpdate(id),
            (ChangeOp::Delete, VersionRef::Secret(id)) => CommitChange::SecretDelete(id),
        }
    }
}

/// Commit record
#[derive(Clone, Debug)]
pub struct Commit {
    pub id: CommitId,
    pub folder_id: FolderId,
    pub environment_id: EnvironmentId,
    /// Store-assigned, globally monotonic. The ordering key for replay.
    pub seq: i64,
    pub actor: Actor,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for appending a commit
#[derive(Clone, Debug)]
pub struct CreateCommitParams {
    pub folder_id: FolderId,
    pub environment_id: EnvironmentId,
    pub actor: Actor,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_op_roundtrip() {
        for op in [ChangeOp::Add, ChangeOp::Update, ChangeOp::Delete] {
            assert_eq!(op.to_string().parse::<ChangeOp>(), Ok(op));
        }
    }

    #[test]
    fn test_actor_type_roundtrip() {
        for t in [ActorType::User, ActorType::Identity, ActorType::Platform] {
            assert_eq!(t.to_string().parse::<ActorType>(), Ok(t));
        }
        assert!("robot".parse::<ActorType>().is_err());
    }

    #[test]
    fn test_commit_change_parts() {
        let fv = FolderVersionId(Uuid::new_v4());
        let change = CommitChange::FolderUpdate(fv);
        assert_eq!(change.op(), ChangeOp::Update);
        assert!(change.is_update());
        assert_eq!(change.version_ref(), VersionRef::Folder(fv));
        assert_eq!(
            CommitChange::from_parts(change.op(), change.version_ref()),
            change
        );
    }

    #[test]
    fn test_actor_metadata_json_skips_empty() {
        let actor = Actor::platform();
        let json = serde_json::to_string(&actor.metadata).unwrap();
        assert_eq!(json, "{}");
    }
}
