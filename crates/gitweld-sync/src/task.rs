//! Sync task model: kinds, persisted state machine, and dedupe keys.

use chrono::{DateTime, Utc};
use gitweld_core::{SyncLogId, SyncScope, TaskId, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// The seven task kinds the engine processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    MemberAdd,
    MemberUpdate,
    MemberRemove,
    BatchEntitySync,
    OrgMemberAdd,
    OrgMemberRemove,
    OrgRoleUpdate,
}

impl TaskKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemberAdd => "member_add",
            Self::MemberUpdate => "member_update",
            Self::MemberRemove => "member_remove",
            Self::BatchEntitySync => "batch_entity_sync",
            Self::OrgMemberAdd => "org_member_add",
            Self::OrgMemberRemove => "org_member_remove",
            Self::OrgRoleUpdate => "org_role_update",
        }
    }

    /// Whether this kind operates on organization membership.
    #[must_use]
    pub fn is_org(&self) -> bool {
        matches!(
            self,
            Self::OrgMemberAdd | Self::OrgMemberRemove | Self::OrgRoleUpdate
        )
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member_add" => Ok(Self::MemberAdd),
            "member_update" => Ok(Self::MemberUpdate),
            "member_remove" => Ok(Self::MemberRemove),
            "batch_entity_sync" => Ok(Self::BatchEntitySync),
            "org_member_add" => Ok(Self::OrgMemberAdd),
            "org_member_remove" => Ok(Self::OrgMemberRemove),
            "org_role_update" => Ok(Self::OrgRoleUpdate),
            _ => Err(format!("Invalid task kind: {s}")),
        }
    }
}

/// Persisted task state machine.
///
/// `Pending -> Active -> (Succeeded | Failed | Retrying)`, and
/// `Retrying -> Active`. Anything else is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Active,
    Retrying,
    Succeeded,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Whether the task is still waiting to run (eligible for dedupe).
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Retrying)
    }

    /// Whether the machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Retrying, TaskState::Active)
                | (
                    Self::Active,
                    TaskState::Succeeded | TaskState::Failed | TaskState::Retrying
                )
        )
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic dedupe key for a submission.
///
/// The same kind, entity and subject always produce the same key, so a
/// resubmission collapses onto the open task instead of queueing twice.
#[must_use]
pub fn task_key(kind: TaskKind, entity: Uuid, user: Option<Uuid>) -> String {
    match user {
        Some(user) => format!("{kind}-{entity}-{user}"),
        None => format!("{kind}-{entity}"),
    }
}

/// Fixed-width digest of a task key, used for the unique queue index.
#[must_use]
pub fn task_fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// A task as stored on the queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub scope_kind: String,
    pub entity_id: Uuid,
    pub subject_user_id: Option<Uuid>,
    pub desired_role: Option<String>,
    pub sync_log_id: Uuid,
    pub task_key: String,
    pub key_fingerprint: String,
    pub state: TaskState,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub run_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncTask {
    /// The typed scope, when the persisted kind tag is recognized.
    #[must_use]
    pub fn scope(&self) -> Option<SyncScope> {
        SyncScope::from_parts(&self.scope_kind, self.entity_id)
    }

    #[must_use]
    pub fn task_id(&self) -> TaskId {
        TaskId::from_uuid(self.id)
    }

    #[must_use]
    pub fn log_id(&self) -> SyncLogId {
        SyncLogId::from_uuid(self.sync_log_id)
    }
}

/// A submission headed for the queue.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub kind: TaskKind,
    pub scope: SyncScope,
    pub subject_user_id: Option<UserId>,
    pub desired_role: Option<String>,
    pub sync_log_id: SyncLogId,
    /// Appended to the dedupe key so a manual resubmission is not collapsed
    /// onto history.
    pub key_suffix: Option<String>,
}

impl NewTask {
    /// The readable dedupe key for this submission.
    #[must_use]
    pub fn key(&self) -> String {
        let base = task_key(
            self.kind,
            self.scope.entity_uuid(),
            self.subject_user_id.map(UserId::into_uuid),
        );
        match &self.key_suffix {
            Some(suffix) => format!("{base}-{suffix}"),
            None => base,
        }
    }
}
