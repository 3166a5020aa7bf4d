//! Project and environment types.

use chrono::{DateTime, Utc};

use super::{EnvironmentId, ProjectId};

/// Project record
#[derive(Clone, Debug)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a project
#[derive(Clone, Debug)]
pub struct CreateProjectParams {
    pub name: String,
}

/// Environment record
#[derive(Clone, Debug)]
pub struct Environment {
    pub id: EnvironmentId,
    pub project_id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an environment
#[derive(Clone, Debug)]
pub struct CreateEnvironmentParams {
    pub project_id: ProjectId,
    pub name: String,
}
