//! Secret and secret version types.

use chrono::{DateTime, Utc};

use super::{FolderId, SecretId, SecretVersionId};

/// Secret record (live key within a folder)
#[derive(Clone, Debug)]
pub struct Secret {
    pub id: SecretId,
    pub folder_id: FolderId,
    pub key: String,
    /// Monotonically increasing per-secret version counter.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of one secret mutation
#[derive(Clone, Debug)]
pub struct SecretVersion {
    pub id: SecretVersionId,
    pub secret_id: SecretId,
    pub folder_id: FolderId,
    pub version: i64,
    pub key: String,
    /// Opaque ciphertext; encryption happens upstream.
    pub encrypted_value: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a secret
#[derive(Clone, Debug)]
pub struct CreateSecretParams {
    pub folder_id: FolderId,
    pub key: String,
    pub encrypted_value: Vec<u8>,
}

/// Parameters for updating a secret (bumps the version counter)
#[derive(Clone, Debug)]
pub struct UpdateSecretParams {
    pub secret_id: SecretId,
    pub encrypted_value: Vec<u8>,
}
