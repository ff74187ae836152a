//! Sync scope: which collaboration entity a task or conflict refers to.

use crate::ids::{OrgId, ProjectId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// The entity a sync operation targets.
///
/// The engine serves both repository collaborators (project scope) and
/// group membership (organization scope) with the same queue and worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SyncScope {
    Project(ProjectId),
    Organization(OrgId),
}

impl SyncScope {
    /// The raw UUID of the scoped entity.
    #[must_use]
    pub fn entity_uuid(&self) -> Uuid {
        match self {
            Self::Project(id) => id.into_uuid(),
            Self::Organization(id) => id.into_uuid(),
        }
    }

    /// Stable string tag for the scope kind, used in audit records.
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Project(_) => "project",
            Self::Organization(_) => "organization",
        }
    }

    /// Reassemble a scope from its persisted parts.
    #[must_use]
    pub fn from_parts(kind: &str, entity: Uuid) -> Option<Self> {
        match kind {
            "project" => Some(Self::Project(ProjectId::from_uuid(entity))),
            "organization" => Some(Self::Organization(OrgId::from_uuid(entity))),
            _ => None,
        }
    }
}

impl Display for SyncScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.entity_uuid())
    }
}
