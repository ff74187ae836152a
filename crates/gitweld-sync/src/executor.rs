//! Task execution against the provider boundary.
//!
//! The executor is free of queue and database concerns: it resolves the
//! system-of-record context for a task, performs the provider call, and
//! reports a [`TaskOutcome`]. The worker turns outcomes into state
//! transitions and audit updates.

use crate::directory::{GitIntegration, MembershipDirectory};
use crate::error::{SyncError, SyncResult};
use crate::task::{SyncTask, TaskKind};
use gitweld_core::{PermissionTier, SyncScope, UserId};
use gitweld_provider::api::{AppliedChange, GitHostApi};
use gitweld_provider::mapping::{github_org_role, gitlab_level, to_provider_permission};
use gitweld_provider::{GitProvider, ProviderPermission, ProviderRegistry};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Result of executing one task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The provider now reflects the desired state.
    Completed {
        note: Option<String>,
        applied: Option<AppliedChange>,
        manifest: Option<BatchManifest>,
    },
    /// Nothing to do, by design.
    Skipped { reason: String },
    /// The task failed; the worker decides between retry and terminal.
    Failed {
        error: SyncError,
        manifest: Option<BatchManifest>,
    },
}

impl TaskOutcome {
    fn completed(applied: AppliedChange) -> Self {
        Self::Completed {
            note: None,
            applied: Some(applied),
            manifest: None,
        }
    }

    fn completed_with_note(note: impl Into<String>) -> Self {
        Self::Completed {
            note: Some(note.into()),
            applied: None,
            manifest: None,
        }
    }

    fn failed(error: impl Into<SyncError>) -> Self {
        Self::Failed {
            error: error.into(),
            manifest: None,
        }
    }
}

/// Per-member results of a batch sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchManifest {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BatchError>,
}

/// One failed member within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub user_id: Uuid,
    pub message: String,
}

/// The provider permission a member's internal role entitles them to.
pub(crate) fn desired_member_permission(provider: GitProvider, role: &str) -> ProviderPermission {
    to_provider_permission(provider, PermissionTier::from_project_role(role), false)
}

/// The provider org role or group level an internal org role entitles to.
pub(crate) fn desired_org_permission(provider: GitProvider, role: &str) -> ProviderPermission {
    match provider {
        GitProvider::GitHub => ProviderPermission::named(github_org_role(role)),
        GitProvider::GitLab => ProviderPermission::level(gitlab_level(
            PermissionTier::from_org_role(role),
            role.eq_ignore_ascii_case("owner"),
        )),
    }
}

/// Executes sync tasks against the provider boundary.
pub struct TaskExecutor {
    directory: Arc<dyn MembershipDirectory>,
    registry: ProviderRegistry,
}

impl TaskExecutor {
    pub fn new(directory: Arc<dyn MembershipDirectory>, registry: ProviderRegistry) -> Self {
        Self {
            directory,
            registry,
        }
    }

    /// Execute one task. Never panics; every failure mode is an outcome.
    pub async fn execute(&self, task: &SyncTask) -> TaskOutcome {
        let Some(scope) = task.scope() else {
            return TaskOutcome::failed(SyncError::internal(format!(
                "unknown scope kind '{}'",
                task.scope_kind
            )));
        };

        let integration = match self.directory.integration(&scope).await {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                return TaskOutcome::Skipped {
                    reason: "entity has no git integration".to_string(),
                }
            }
            Err(e) => return TaskOutcome::failed(e),
        };

        let Some(client) = self.registry.get(integration.provider) else {
            return TaskOutcome::failed(SyncError::provider_unavailable(integration.provider));
        };

        match task.kind {
            TaskKind::MemberAdd | TaskKind::MemberUpdate => {
                self.sync_member(&integration, client.as_ref(), task).await
            }
            TaskKind::MemberRemove => {
                self.remove_member(&integration, client.as_ref(), task).await
            }
            TaskKind::BatchEntitySync => {
                self.batch_sync(&scope, &integration, client.as_ref()).await
            }
            TaskKind::OrgMemberAdd | TaskKind::OrgRoleUpdate => {
                self.sync_org_member(&integration, client.as_ref(), task).await
            }
            TaskKind::OrgMemberRemove => {
                self.remove_org_member(&integration, client.as_ref(), task).await
            }
        }
    }

    async fn resolve_login(
        &self,
        task: &SyncTask,
        provider: GitProvider,
    ) -> SyncResult<Option<String>> {
        let Some(user_uuid) = task.subject_user_id else {
            return Err(SyncError::internal("task is missing its subject user"));
        };
        let account = self
            .directory
            .linked_account(UserId::from_uuid(user_uuid), provider)
            .await?;
        Ok(account.map(|a| a.login))
    }

    async fn sync_member(
        &self,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
        task: &SyncTask,
    ) -> TaskOutcome {
        let login = match self.resolve_login(task, integration.provider).await {
            Ok(Some(login)) => login,
            // Granting access requires a linked account; this cannot heal on
            // its own, so it fails terminally.
            Ok(None) => {
                return TaskOutcome::failed(SyncError::not_found(
                    "linked git account",
                    task.subject_user_id.unwrap_or_default().to_string(),
                ))
            }
            Err(e) => return TaskOutcome::failed(e),
        };

        // A missing role degrades to the read tier.
        let role = task.desired_role.as_deref().unwrap_or("");
        let permission = desired_member_permission(integration.provider, role);

        let result = match task.kind {
            TaskKind::MemberUpdate => {
                client
                    .update_collaborator(&integration.token, &integration.resource_id, &login, &permission)
                    .await
            }
            _ => {
                client
                    .add_collaborator(&integration.token, &integration.resource_id, &login, &permission)
                    .await
            }
        };

        match result {
            Ok(applied) => TaskOutcome::completed(applied),
            Err(e) => TaskOutcome::failed(e),
        }
    }

    async fn remove_member(
        &self,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
        task: &SyncTask,
    ) -> TaskOutcome {
        let login = match self.resolve_login(task, integration.provider).await {
            Ok(Some(login)) => login,
            // Nothing to revoke for a user who never linked an account.
            Ok(None) => return TaskOutcome::completed_with_note("user has no linked git account"),
            Err(e) => return TaskOutcome::failed(e),
        };

        match client
            .remove_collaborator(&integration.token, &integration.resource_id, &login)
            .await
        {
            Ok(()) => TaskOutcome::completed_with_note(format!("removed {login}")),
            Err(e) => TaskOutcome::failed(e),
        }
    }

    async fn batch_sync(
        &self,
        scope: &SyncScope,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
    ) -> TaskOutcome {
        let members = match self.directory.members(scope).await {
            Ok(members) => members,
            Err(e) => return TaskOutcome::failed(e),
        };

        let mut manifest = BatchManifest::default();
        for member in members {
            manifest.total += 1;
            let result: SyncResult<()> = async {
                let account = self
                    .directory
                    .linked_account(member.user_id, integration.provider)
                    .await?;
                let Some(account) = account else {
                    return Err(SyncError::not_found(
                        "linked git account",
                        member.user_id.to_string(),
                    ));
                };
                let permission = desired_member_permission(integration.provider, &member.role);
                client
                    .add_collaborator(
                        &integration.token,
                        &integration.resource_id,
                        &account.login,
                        &permission,
                    )
                    .await?;
                Ok(())
            }
            .await;

            match result {
                Ok(()) => manifest.succeeded += 1,
                Err(e) => {
                    manifest.failed += 1;
                    manifest.errors.push(BatchError {
                        user_id: member.user_id.into_uuid(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if manifest.failed == 0 {
            TaskOutcome::Completed {
                note: None,
                applied: None,
                manifest: Some(manifest),
            }
        } else {
            TaskOutcome::Failed {
                error: SyncError::internal(format!(
                    "batch sync finished with {} of {} members failed",
                    manifest.failed, manifest.total
                )),
                manifest: Some(manifest),
            }
        }
    }

    async fn sync_org_member(
        &self,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
        task: &SyncTask,
    ) -> TaskOutcome {
        let login = match self.resolve_login(task, integration.provider).await {
            Ok(Some(login)) => login,
            Ok(None) => {
                return TaskOutcome::failed(SyncError::not_found(
                    "linked git account",
                    task.subject_user_id.unwrap_or_default().to_string(),
                ))
            }
            Err(e) => return TaskOutcome::failed(e),
        };

        let role = task.desired_role.as_deref().unwrap_or("");
        let permission = desired_org_permission(integration.provider, role);

        let result = match task.kind {
            TaskKind::OrgRoleUpdate => {
                client
                    .update_org_member_role(&integration.token, &integration.resource_id, &login, &permission)
                    .await
            }
            _ => {
                client
                    .add_org_member(&integration.token, &integration.resource_id, &login, &permission)
                    .await
            }
        };

        match result {
            Ok(applied) => TaskOutcome::completed(applied),
            Err(e) => TaskOutcome::failed(e),
        }
    }

    async fn remove_org_member(
        &self,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
        task: &SyncTask,
    ) -> TaskOutcome {
        let login = match self.resolve_login(task, integration.provider).await {
            Ok(Some(login)) => login,
            Ok(None) => return TaskOutcome::completed_with_note("user has no linked git account"),
            Err(e) => return TaskOutcome::failed(e),
        };

        match client
            .remove_org_member(&integration.token, &integration.resource_id, &login)
            .await
        {
            Ok(()) => TaskOutcome::completed_with_note(format!("removed {login}")),
            Err(e) => TaskOutcome::failed(e),
        }
    }
}
