//! Organization-level sync surface.
//!
//! Thin façade over intake and conflict detection for callers that think in
//! organizations rather than scopes.

use crate::conflict::{ConflictService, ConflictStats, ResolutionReport, ResolveOptions};
use crate::error::SyncResult;
use crate::intake::IntakeService;
use crate::log::SyncStats;
use gitweld_core::{OrgId, SyncLogId, SyncScope, UserId};
use serde::Serialize;
use std::sync::Arc;

/// Combined sync and conflict state for one organization.
#[derive(Debug, Clone, Serialize)]
pub struct OrgSyncStatus {
    pub sync: SyncStats,
    pub conflicts: ConflictStats,
}

/// Organization membership sync operations.
pub struct OrgSyncService {
    intake: Arc<IntakeService>,
    conflicts: Arc<ConflictService>,
}

impl OrgSyncService {
    #[must_use]
    pub fn new(intake: Arc<IntakeService>, conflicts: Arc<ConflictService>) -> Self {
        Self { intake, conflicts }
    }

    pub async fn member_added(
        &self,
        org_id: OrgId,
        user_id: UserId,
        role: &str,
    ) -> SyncResult<Option<SyncLogId>> {
        self.intake.sync_org_member_added(org_id, user_id, role).await
    }

    pub async fn member_removed(
        &self,
        org_id: OrgId,
        user_id: UserId,
    ) -> SyncResult<Option<SyncLogId>> {
        self.intake.sync_org_member_removed(org_id, user_id).await
    }

    pub async fn role_updated(
        &self,
        org_id: OrgId,
        user_id: UserId,
        role: &str,
    ) -> SyncResult<Option<SyncLogId>> {
        self.intake.sync_org_role_updated(org_id, user_id, role).await
    }

    /// Queue a re-push of the whole organization membership.
    pub async fn full_sync(&self, org_id: OrgId) -> SyncResult<Option<SyncLogId>> {
        self.intake
            .sync_entity(SyncScope::Organization(org_id))
            .await
    }

    /// Run a conflict resolution pass for the organization.
    pub async fn resolve_conflicts(
        &self,
        org_id: OrgId,
        options: &ResolveOptions,
    ) -> SyncResult<ResolutionReport> {
        self.conflicts
            .resolve(&SyncScope::Organization(org_id), options)
            .await
    }

    /// Sync history counts plus current conflict counts.
    pub async fn status(&self, org_id: OrgId) -> SyncResult<OrgSyncStatus> {
        let scope = SyncScope::Organization(org_id);
        let sync = self.intake.sync_stats(scope.entity_uuid()).await?;
        let conflicts = self.conflicts.stats(&scope).await?;
        Ok(OrgSyncStatus { sync, conflicts })
    }
}
