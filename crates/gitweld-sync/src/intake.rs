//! Intake: where membership changes enter the engine.
//!
//! Each accepted operation creates one pending [`SyncLogRecord`] and enqueues
//! one task. An entity without a git integration is not an error; the
//! operation is acknowledged with nothing to do, and the triggering caller is
//! never failed by sync bookkeeping.

use crate::directory::MembershipDirectory;
use crate::error::{SyncError, SyncResult};
use crate::log::{NewSyncLog, SyncAction, SyncLogRecord, SyncStats, SyncType};
use crate::queue::SyncQueue;
use crate::task::{NewTask, TaskKind};
use chrono::Utc;
use gitweld_core::{OrgId, ProjectId, SyncLogId, SyncScope, UserId};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The task kind that re-runs a persisted sync record.
#[must_use]
pub fn kind_for(sync_type: SyncType, action: SyncAction) -> Option<TaskKind> {
    match (sync_type, action) {
        (SyncType::Member, SyncAction::Add) => Some(TaskKind::MemberAdd),
        (SyncType::Member, SyncAction::Update) => Some(TaskKind::MemberUpdate),
        (SyncType::Member, SyncAction::Remove) => Some(TaskKind::MemberRemove),
        (SyncType::Organization, SyncAction::Add) => Some(TaskKind::OrgMemberAdd),
        (SyncType::Organization, SyncAction::Update) => Some(TaskKind::OrgRoleUpdate),
        (SyncType::Organization, SyncAction::Remove) => Some(TaskKind::OrgMemberRemove),
        (SyncType::Project | SyncType::Organization, SyncAction::BatchSync) => {
            Some(TaskKind::BatchEntitySync)
        }
        _ => None,
    }
}

/// Accepts sync operations and exposes the audit log.
pub struct IntakeService {
    pool: PgPool,
    queue: SyncQueue,
    directory: Arc<dyn MembershipDirectory>,
}

impl IntakeService {
    #[must_use]
    pub fn new(pool: PgPool, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self {
            queue: SyncQueue::new(pool.clone()),
            pool,
            directory,
        }
    }

    /// A member was added to a project.
    pub async fn sync_member_added(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: &str,
    ) -> SyncResult<Option<SyncLogId>> {
        self.submit(
            SyncScope::Project(project_id),
            TaskKind::MemberAdd,
            SyncType::Member,
            SyncAction::Add,
            Some(user_id),
            Some(role),
            None,
        )
        .await
    }

    /// A member's project role changed.
    pub async fn sync_member_updated(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: &str,
    ) -> SyncResult<Option<SyncLogId>> {
        self.submit(
            SyncScope::Project(project_id),
            TaskKind::MemberUpdate,
            SyncType::Member,
            SyncAction::Update,
            Some(user_id),
            Some(role),
            None,
        )
        .await
    }

    /// A member was removed from a project.
    pub async fn sync_member_removed(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> SyncResult<Option<SyncLogId>> {
        self.submit(
            SyncScope::Project(project_id),
            TaskKind::MemberRemove,
            SyncType::Member,
            SyncAction::Remove,
            Some(user_id),
            None,
            None,
        )
        .await
    }

    /// Re-push every member of an entity to the provider.
    pub async fn sync_entity(&self, scope: SyncScope) -> SyncResult<Option<SyncLogId>> {
        let sync_type = match scope {
            SyncScope::Project(_) => SyncType::Project,
            SyncScope::Organization(_) => SyncType::Organization,
        };
        self.submit(
            scope,
            TaskKind::BatchEntitySync,
            sync_type,
            SyncAction::BatchSync,
            None,
            None,
            None,
        )
        .await
    }

    /// A member joined an organization.
    pub async fn sync_org_member_added(
        &self,
        org_id: OrgId,
        user_id: UserId,
        role: &str,
    ) -> SyncResult<Option<SyncLogId>> {
        self.submit(
            SyncScope::Organization(org_id),
            TaskKind::OrgMemberAdd,
            SyncType::Organization,
            SyncAction::Add,
            Some(user_id),
            Some(role),
            None,
        )
        .await
    }

    /// A member left an organization.
    pub async fn sync_org_member_removed(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> SyncResult<Option<SyncLogId>> {
        self.submit(
            SyncScope::Organization(org_id),
            TaskKind::OrgMemberRemove,
            SyncType::Organization,
            SyncAction::Remove,
            Some(user_id),
            None,
            None,
        )
        .await
    }

    /// A member's organization role changed.
    pub async fn sync_org_role_updated(
        &self,
        org_id: OrgId,
        user_id: UserId,
        role: &str,
    ) -> SyncResult<Option<SyncLogId>> {
        self.submit(
            SyncScope::Organization(org_id),
            TaskKind::OrgRoleUpdate,
            SyncType::Organization,
            SyncAction::Update,
            Some(user_id),
            Some(role),
            None,
        )
        .await
    }

    /// Manually re-run a failed sync record.
    ///
    /// The record itself is reset to pending and a fresh task is queued with
    /// a suffixed dedupe key, so the resubmission is not collapsed onto the
    /// finished task row.
    pub async fn retry(&self, sync_log_id: SyncLogId) -> SyncResult<SyncLogId> {
        let id = sync_log_id.into_uuid();
        let record = SyncLogRecord::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| SyncError::not_found("sync log", id.to_string()))?;

        let kind = kind_for(record.sync_type, record.action).ok_or_else(|| {
            SyncError::internal(format!(
                "sync record action '{}' cannot be retried as a task",
                record.action
            ))
        })?;
        let scope = match record.sync_type {
            SyncType::Organization => SyncScope::Organization(OrgId::from_uuid(record.entity_id)),
            SyncType::Member | SyncType::Project => {
                SyncScope::Project(ProjectId::from_uuid(record.entity_id))
            }
        };
        let role = record
            .metadata
            .get("role")
            .and_then(|v| v.as_str())
            .map(String::from);

        SyncLogRecord::reset_pending(&self.pool, id).await?;

        let task = NewTask {
            kind,
            scope,
            subject_user_id: record.user_id.map(UserId::from_uuid),
            desired_role: role,
            sync_log_id,
            key_suffix: Some(Utc::now().timestamp_millis().to_string()),
        };
        self.queue.enqueue(&task).await?;

        info!(sync_log = %id, kind = %kind, "failed sync resubmitted");
        Ok(sync_log_id)
    }

    /// Recent sync history for an entity, newest first.
    pub async fn logs_for_entity(
        &self,
        entity_id: Uuid,
        limit: i64,
    ) -> SyncResult<Vec<SyncLogRecord>> {
        SyncLogRecord::list_for_entity(&self.pool, entity_id, limit).await
    }

    /// Failed syncs, optionally scoped to one entity.
    pub async fn failed_logs(
        &self,
        entity_id: Option<Uuid>,
        limit: i64,
    ) -> SyncResult<Vec<SyncLogRecord>> {
        SyncLogRecord::list_failed(&self.pool, entity_id, limit).await
    }

    /// Aggregate sync counts for an entity.
    pub async fn sync_stats(&self, entity_id: Uuid) -> SyncResult<SyncStats> {
        SyncLogRecord::stats(&self.pool, entity_id).await
    }

    async fn submit(
        &self,
        scope: SyncScope,
        kind: TaskKind,
        sync_type: SyncType,
        action: SyncAction,
        user_id: Option<UserId>,
        role: Option<&str>,
        key_suffix: Option<String>,
    ) -> SyncResult<Option<SyncLogId>> {
        let Some(integration) = self.directory.integration(&scope).await? else {
            info!(scope = %scope, "entity has no git integration, nothing to sync");
            return Ok(None);
        };

        let record = SyncLogRecord::create(
            &self.pool,
            NewSyncLog {
                sync_type,
                action,
                provider: integration.provider.to_string(),
                resource_type: integration.resource_type.clone(),
                resource_id: integration.resource_id.clone(),
                entity_id: scope.entity_uuid(),
                user_id: user_id.map(UserId::into_uuid),
                metadata: serde_json::json!({
                    "attempt_count": 0,
                    "role": role,
                }),
            },
        )
        .await?;

        let task = NewTask {
            kind,
            scope,
            subject_user_id: user_id,
            desired_role: role.map(String::from),
            sync_log_id: SyncLogId::from_uuid(record.id),
            key_suffix,
        };
        self.queue.enqueue(&task).await?;

        info!(sync_log = %record.id, kind = %kind, "sync task queued");
        Ok(Some(SyncLogId::from_uuid(record.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_for_covers_every_retryable_pair() {
        assert_eq!(
            kind_for(SyncType::Member, SyncAction::Add),
            Some(TaskKind::MemberAdd)
        );
        assert_eq!(
            kind_for(SyncType::Member, SyncAction::Update),
            Some(TaskKind::MemberUpdate)
        );
        assert_eq!(
            kind_for(SyncType::Member, SyncAction::Remove),
            Some(TaskKind::MemberRemove)
        );
        assert_eq!(
            kind_for(SyncType::Organization, SyncAction::Add),
            Some(TaskKind::OrgMemberAdd)
        );
        assert_eq!(
            kind_for(SyncType::Organization, SyncAction::Update),
            Some(TaskKind::OrgRoleUpdate)
        );
        assert_eq!(
            kind_for(SyncType::Organization, SyncAction::Remove),
            Some(TaskKind::OrgMemberRemove)
        );
        assert_eq!(
            kind_for(SyncType::Project, SyncAction::BatchSync),
            Some(TaskKind::BatchEntitySync)
        );
        assert_eq!(
            kind_for(SyncType::Organization, SyncAction::BatchSync),
            Some(TaskKind::BatchEntitySync)
        );
    }

    #[test]
    fn test_conflict_resolution_records_are_not_retryable_tasks() {
        assert_eq!(
            kind_for(SyncType::Project, SyncAction::ConflictResolution),
            None
        );
        assert_eq!(kind_for(SyncType::Project, SyncAction::Add), None);
    }
}
