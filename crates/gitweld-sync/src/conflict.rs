//! Conflict detection and resolution.
//!
//! A conflict is a disagreement between the membership the directory says an
//! entity should have and what the provider actually has. Detection is a pure
//! comparison over the two snapshots; resolution replays the internal state
//! onto the provider, one conflict at a time, and never lets one failure stop
//! the rest of the pass.

use crate::directory::{GitIntegration, MembershipDirectory};
use crate::error::{SyncError, SyncResult};
use crate::executor::{desired_member_permission, desired_org_permission};
use crate::log::{NewSyncLog, SyncAction, SyncLogRecord, SyncType};
use crate::span;
use chrono::{DateTime, Utc};
use gitweld_core::{EventBus, PermissionTier, SyncEvent, SyncScope, UserId};
use gitweld_provider::api::GitHostApi;
use gitweld_provider::mapping::{tier_from_org_permission, tier_from_permission};
use gitweld_provider::{Collaborator, GitProvider, ProviderPermission, ProviderRegistry};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// The ways internal and external state can disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides have the member, at different permission tiers.
    PermissionMismatch,
    /// The directory has the member, the provider does not.
    MissingExternally,
    /// The provider has a collaborator the directory does not know about.
    ExtraExternally,
}

impl ConflictKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionMismatch => "permission_mismatch",
            Self::MissingExternally => "missing_externally",
            Self::ExtraExternally => "extra_externally",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An internal member with a linked provider account, ready for comparison.
#[derive(Debug, Clone)]
pub struct LinkedMember {
    pub user_id: UserId,
    pub login: String,
    pub role: String,
    pub tier: PermissionTier,
}

/// One detected disagreement.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Provider login, as the provider reports it.
    pub login: String,
    pub user_id: Option<UserId>,
    pub internal_role: Option<String>,
    pub expected_tier: Option<PermissionTier>,
    pub external_permission: Option<ProviderPermission>,
}

/// Compare the two membership snapshots.
///
/// Logins match case-insensitively; the provider's casing is kept in the
/// reported conflicts. Members without a linked account must be filtered out
/// before calling this. The scope picks the reverse mapping for named
/// values: org membership roles grant the write tier to a regular `member`,
/// repository permission strings do not.
#[must_use]
pub fn partition(
    scope: &SyncScope,
    members: &[LinkedMember],
    external: &[Collaborator],
) -> Vec<Conflict> {
    let index: HashMap<String, &Collaborator> = external
        .iter()
        .map(|c| (c.login.to_lowercase(), c))
        .collect();
    let claimed: HashSet<String> = members.iter().map(|m| m.login.to_lowercase()).collect();

    let mut conflicts = Vec::new();

    for member in members {
        match index.get(&member.login.to_lowercase()) {
            None => conflicts.push(Conflict {
                kind: ConflictKind::MissingExternally,
                login: member.login.clone(),
                user_id: Some(member.user_id),
                internal_role: Some(member.role.clone()),
                expected_tier: Some(member.tier),
                external_permission: None,
            }),
            Some(collaborator) => {
                let actual = match scope {
                    SyncScope::Organization(_) => {
                        tier_from_org_permission(&collaborator.permission)
                    }
                    SyncScope::Project(_) => tier_from_permission(&collaborator.permission),
                };
                if actual != member.tier {
                    conflicts.push(Conflict {
                        kind: ConflictKind::PermissionMismatch,
                        login: collaborator.login.clone(),
                        user_id: Some(member.user_id),
                        internal_role: Some(member.role.clone()),
                        expected_tier: Some(member.tier),
                        external_permission: Some(collaborator.permission.clone()),
                    });
                }
            }
        }
    }

    for collaborator in external {
        if !claimed.contains(&collaborator.login.to_lowercase()) {
            conflicts.push(Conflict {
                kind: ConflictKind::ExtraExternally,
                login: collaborator.login.clone(),
                user_id: None,
                internal_role: None,
                expected_tier: None,
                external_permission: Some(collaborator.permission.clone()),
            });
        }
    }

    conflicts
}

/// What a resolution pass is allowed to touch.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// When false, conflicts are detected and reported but nothing is written.
    pub auto_resolve: bool,
    /// Conflict kinds the pass may act on. Removal of external-only
    /// collaborators is opt-in.
    pub kinds: Vec<ConflictKind>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            auto_resolve: true,
            kinds: vec![
                ConflictKind::PermissionMismatch,
                ConflictKind::MissingExternally,
            ],
        }
    }
}

impl ResolveOptions {
    #[must_use]
    pub fn detect_only() -> Self {
        Self {
            auto_resolve: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_kinds(mut self, kinds: Vec<ConflictKind>) -> Self {
        self.kinds = kinds;
        self
    }
}

/// What happened to one conflict during a pass.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionDetail {
    pub login: String,
    pub kind: ConflictKind,
    pub action: &'static str,
    /// The provider-side permission before the pass touched it.
    pub before: Option<ProviderPermission>,
    /// The permission in effect after a successful resolution; `None` after
    /// a removal, a skip, or a failure.
    pub after: Option<ProviderPermission>,
    pub outcome: String,
}

/// Summary of one resolution pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub detected: usize,
    pub resolved: usize,
    pub failed: usize,
    pub skipped: usize,
    pub details: Vec<ResolutionDetail>,
}

/// Conflict counts for a scope, for status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictStats {
    pub total: usize,
    pub permission_mismatch: usize,
    pub missing_externally: usize,
    pub extra_externally: usize,
    pub checked_at: DateTime<Utc>,
}

/// Detects conflicts and replays internal state onto the provider.
///
/// Holds no persistence; [`ConflictService`] wraps it with audit records and
/// events.
pub struct ConflictEngine {
    directory: Arc<dyn MembershipDirectory>,
    registry: ProviderRegistry,
}

impl ConflictEngine {
    #[must_use]
    pub fn new(directory: Arc<dyn MembershipDirectory>, registry: ProviderRegistry) -> Self {
        Self {
            directory,
            registry,
        }
    }

    /// Detect conflicts for a scope. A scope with no git integration has
    /// nothing to conflict with.
    pub async fn detect(&self, scope: &SyncScope) -> SyncResult<Vec<Conflict>> {
        let Some(integration) = self.directory.integration(scope).await? else {
            return Ok(Vec::new());
        };
        let client = self.client(&integration)?;
        self.detect_with(scope, &integration, client.as_ref()).await
    }

    async fn detect_with(
        &self,
        scope: &SyncScope,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
    ) -> SyncResult<Vec<Conflict>> {
        let members = self.linked_members(scope, integration.provider).await?;
        let external = Self::external_members(scope, integration, client).await?;
        Ok(partition(scope, &members, &external))
    }

    fn client(&self, integration: &GitIntegration) -> SyncResult<Arc<dyn GitHostApi>> {
        self.registry
            .get(integration.provider)
            .ok_or_else(|| SyncError::provider_unavailable(integration.provider))
    }

    async fn linked_members(
        &self,
        scope: &SyncScope,
        provider: GitProvider,
    ) -> SyncResult<Vec<LinkedMember>> {
        let mut linked = Vec::new();
        for member in self.directory.members(scope).await? {
            let Some(account) = self.directory.linked_account(member.user_id, provider).await?
            else {
                continue;
            };
            let tier = match scope {
                SyncScope::Organization(_) => PermissionTier::from_org_role(&member.role),
                SyncScope::Project(_) => PermissionTier::from_project_role(&member.role),
            };
            linked.push(LinkedMember {
                user_id: member.user_id,
                login: account.login,
                role: member.role,
                tier,
            });
        }
        Ok(linked)
    }

    async fn external_members(
        scope: &SyncScope,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
    ) -> SyncResult<Vec<Collaborator>> {
        let external = match scope {
            SyncScope::Organization(_) => client
                .list_org_members(&integration.token, &integration.resource_id)
                .await?
                .into_iter()
                .map(|m| Collaborator {
                    login: m.login,
                    permission: m.role,
                })
                .collect(),
            SyncScope::Project(_) => {
                client
                    .list_collaborators(&integration.token, &integration.resource_id)
                    .await?
            }
        };
        Ok(external)
    }

    /// Resolve the given conflicts against the provider, per `options`.
    pub async fn resolve_conflicts(
        &self,
        scope: &SyncScope,
        integration: &GitIntegration,
        conflicts: Vec<Conflict>,
        options: &ResolveOptions,
    ) -> SyncResult<ResolutionReport> {
        let client = self.client(integration)?;
        let mut report = ResolutionReport {
            detected: conflicts.len(),
            ..ResolutionReport::default()
        };

        for conflict in conflicts {
            let before = conflict.external_permission.clone();

            if !options.auto_resolve {
                report.skipped += 1;
                report.details.push(ResolutionDetail {
                    login: conflict.login,
                    kind: conflict.kind,
                    action: "skip",
                    before,
                    after: None,
                    outcome: "auto_resolve disabled".to_string(),
                });
                continue;
            }
            if !options.kinds.contains(&conflict.kind) {
                let outcome = if conflict.kind == ConflictKind::ExtraExternally {
                    "potentially_dangerous"
                } else {
                    "excluded"
                };
                report.skipped += 1;
                report.details.push(ResolutionDetail {
                    login: conflict.login,
                    kind: conflict.kind,
                    action: "skip",
                    before,
                    after: None,
                    outcome: outcome.to_string(),
                });
                continue;
            }

            let action = Self::action_for(&conflict);
            match Self::apply(scope, integration, client.as_ref(), &conflict).await {
                Ok(after) => {
                    report.resolved += 1;
                    report.details.push(ResolutionDetail {
                        login: conflict.login,
                        kind: conflict.kind,
                        action,
                        before,
                        after,
                        outcome: "resolved".to_string(),
                    });
                }
                Err(e) => {
                    warn!(login = %conflict.login, error = %e, "conflict resolution failed");
                    report.failed += 1;
                    report.details.push(ResolutionDetail {
                        login: conflict.login,
                        kind: conflict.kind,
                        action,
                        before,
                        after: None,
                        outcome: format!("failed: {e}"),
                    });
                }
            }
        }
        Ok(report)
    }

    fn action_for(conflict: &Conflict) -> &'static str {
        match conflict.kind {
            ConflictKind::MissingExternally => "add",
            ConflictKind::PermissionMismatch => "update",
            ConflictKind::ExtraExternally => "remove",
        }
    }

    /// Replay internal state for one conflict. Returns the permission now in
    /// effect, or `None` after a removal.
    async fn apply(
        scope: &SyncScope,
        integration: &GitIntegration,
        client: &dyn GitHostApi,
        conflict: &Conflict,
    ) -> SyncResult<Option<ProviderPermission>> {
        let token = &integration.token;
        let resource = &integration.resource_id;

        match conflict.kind {
            ConflictKind::ExtraExternally => {
                match scope {
                    SyncScope::Organization(_) => {
                        client
                            .remove_org_member(token, resource, &conflict.login)
                            .await?;
                    }
                    SyncScope::Project(_) => {
                        client
                            .remove_collaborator(token, resource, &conflict.login)
                            .await?;
                    }
                }
                Ok(None)
            }
            ConflictKind::MissingExternally | ConflictKind::PermissionMismatch => {
                let role = conflict.internal_role.as_deref().unwrap_or("");
                let update = conflict.kind == ConflictKind::PermissionMismatch;
                let permission = match scope {
                    SyncScope::Organization(_) => {
                        let permission = desired_org_permission(integration.provider, role);
                        if update {
                            client
                                .update_org_member_role(token, resource, &conflict.login, &permission)
                                .await?;
                        } else {
                            client
                                .add_org_member(token, resource, &conflict.login, &permission)
                                .await?;
                        }
                        permission
                    }
                    SyncScope::Project(_) => {
                        let permission = desired_member_permission(integration.provider, role);
                        if update {
                            client
                                .update_collaborator(token, resource, &conflict.login, &permission)
                                .await?;
                        } else {
                            client
                                .add_collaborator(token, resource, &conflict.login, &permission)
                                .await?;
                        }
                        permission
                    }
                };
                Ok(Some(permission))
            }
        }
    }
}

/// [`ConflictEngine`] plus audit records and events.
pub struct ConflictService {
    pool: PgPool,
    engine: ConflictEngine,
    directory: Arc<dyn MembershipDirectory>,
    events: EventBus,
}

impl ConflictService {
    #[must_use]
    pub fn new(
        pool: PgPool,
        directory: Arc<dyn MembershipDirectory>,
        registry: ProviderRegistry,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            engine: ConflictEngine::new(directory.clone(), registry),
            directory,
            events,
        }
    }

    /// Detect without writing anything.
    pub async fn detect(&self, scope: &SyncScope) -> SyncResult<Vec<Conflict>> {
        self.engine.detect(scope).await
    }

    /// Run one detect-and-resolve pass, recorded as a single audit record.
    pub async fn resolve(
        &self,
        scope: &SyncScope,
        options: &ResolveOptions,
    ) -> SyncResult<ResolutionReport> {
        span::run_resolution_span(scope, self.resolve_inner(scope, options)).await
    }

    async fn resolve_inner(
        &self,
        scope: &SyncScope,
        options: &ResolveOptions,
    ) -> SyncResult<ResolutionReport> {
        let Some(integration) = self.directory.integration(scope).await? else {
            return Ok(ResolutionReport::default());
        };
        let client = self.engine.client(&integration)?;
        let conflicts = self
            .engine
            .detect_with(scope, &integration, client.as_ref())
            .await?;

        if conflicts.is_empty() {
            info!("no conflicts detected");
            return Ok(ResolutionReport::default());
        }

        let record = SyncLogRecord::create(
            &self.pool,
            NewSyncLog {
                sync_type: match scope {
                    SyncScope::Organization(_) => SyncType::Organization,
                    SyncScope::Project(_) => SyncType::Project,
                },
                action: SyncAction::ConflictResolution,
                provider: integration.provider.to_string(),
                resource_type: integration.resource_type.clone(),
                resource_id: integration.resource_id.clone(),
                entity_id: scope.entity_uuid(),
                user_id: None,
                metadata: serde_json::json!({
                    "detected": conflicts.len(),
                    "auto_resolve": options.auto_resolve,
                }),
            },
        )
        .await?;

        let report = self
            .engine
            .resolve_conflicts(scope, &integration, conflicts, options)
            .await?;

        let patch = serde_json::json!({ "resolution": serde_json::to_value(&report)? });
        if report.failed == 0 {
            SyncLogRecord::mark_success(&self.pool, record.id, patch).await?;
        } else {
            SyncLogRecord::merge_metadata(&self.pool, record.id, patch).await?;
            SyncLogRecord::mark_failed(
                &self.pool,
                record.id,
                &format!(
                    "conflict resolution finished with {} of {} failed",
                    report.failed, report.detected
                ),
                "CONFLICT_RESOLUTION",
                None,
                false,
            )
            .await?;
        }

        self.events.publish(SyncEvent::ConflictResolved {
            scope: *scope,
            resolved: report.resolved,
            failed: report.failed,
            skipped: report.skipped,
        });

        info!(
            detected = report.detected,
            resolved = report.resolved,
            failed = report.failed,
            skipped = report.skipped,
            "conflict resolution pass finished"
        );
        Ok(report)
    }

    /// Current conflict counts for a scope.
    pub async fn stats(&self, scope: &SyncScope) -> SyncResult<ConflictStats> {
        let conflicts = self.engine.detect(scope).await?;
        let count = |kind: ConflictKind| conflicts.iter().filter(|c| c.kind == kind).count();
        Ok(ConflictStats {
            total: conflicts.len(),
            permission_mismatch: count(ConflictKind::PermissionMismatch),
            missing_externally: count(ConflictKind::MissingExternally),
            extra_externally: count(ConflictKind::ExtraExternally),
            checked_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeDirectory, FakeHost};
    use gitweld_core::{OrgId, ProjectId};
    use gitweld_provider::ProviderError;

    fn linked(user_id: UserId, login: &str, role: &str) -> LinkedMember {
        LinkedMember {
            user_id,
            login: login.to_string(),
            role: role.to_string(),
            tier: PermissionTier::from_project_role(role),
        }
    }

    fn org_linked(user_id: UserId, login: &str, role: &str) -> LinkedMember {
        LinkedMember {
            user_id,
            login: login.to_string(),
            role: role.to_string(),
            tier: PermissionTier::from_org_role(role),
        }
    }

    fn collaborator(login: &str, permission: ProviderPermission) -> Collaborator {
        Collaborator {
            login: login.to_string(),
            permission,
        }
    }

    mod partition {
        use super::*;

        fn project_scope() -> SyncScope {
            SyncScope::Project(ProjectId::new())
        }

        fn org_scope() -> SyncScope {
            SyncScope::Organization(OrgId::new())
        }

        #[test]
        fn test_in_sync_membership_yields_no_conflicts() {
            let members = vec![
                linked(UserId::new(), "alice", "maintainer"),
                linked(UserId::new(), "bob", "developer"),
            ];
            let external = vec![
                collaborator("alice", ProviderPermission::named("admin")),
                collaborator("bob", ProviderPermission::named("push")),
            ];
            let conflicts = partition(&project_scope(), &members, &external);
            assert!(conflicts.is_empty());
        }

        #[test]
        fn test_every_disagreement_is_reported_once() {
            let mismatch_user = UserId::new();
            let missing_user = UserId::new();
            let members = vec![
                linked(mismatch_user, "alice", "maintainer"),
                linked(missing_user, "bob", "developer"),
            ];
            let external = vec![
                collaborator("alice", ProviderPermission::named("pull")),
                collaborator("mallory", ProviderPermission::named("admin")),
            ];

            let conflicts = partition(&project_scope(), &members, &external);
            assert_eq!(conflicts.len(), 3);

            let mismatch = conflicts
                .iter()
                .find(|c| c.kind == ConflictKind::PermissionMismatch)
                .unwrap();
            assert_eq!(mismatch.user_id, Some(mismatch_user));
            assert_eq!(mismatch.expected_tier, Some(PermissionTier::Admin));

            let missing = conflicts
                .iter()
                .find(|c| c.kind == ConflictKind::MissingExternally)
                .unwrap();
            assert_eq!(missing.user_id, Some(missing_user));
            assert_eq!(missing.login, "bob");

            let extra = conflicts
                .iter()
                .find(|c| c.kind == ConflictKind::ExtraExternally)
                .unwrap();
            assert_eq!(extra.login, "mallory");
            assert!(extra.user_id.is_none());
        }

        #[test]
        fn test_logins_match_case_insensitively() {
            let members = vec![linked(UserId::new(), "Alice", "developer")];
            let external = vec![collaborator("alice", ProviderPermission::named("push"))];
            let conflicts = partition(&project_scope(), &members, &external);
            assert!(conflicts.is_empty());
        }

        #[test]
        fn test_level_permissions_compare_by_tier() {
            let members = vec![linked(UserId::new(), "alice", "developer")];
            let external = vec![collaborator("alice", ProviderPermission::level(40))];
            let conflicts = partition(&project_scope(), &members, &external);
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].kind, ConflictKind::PermissionMismatch);
        }

        #[test]
        fn test_in_sync_org_members_are_not_mismatches() {
            let members = vec![
                org_linked(UserId::new(), "alice", "owner"),
                org_linked(UserId::new(), "bob", "member"),
            ];
            let external = vec![
                collaborator("alice", ProviderPermission::named("admin")),
                collaborator("bob", ProviderPermission::named("member")),
            ];
            let conflicts = partition(&org_scope(), &members, &external);
            assert!(conflicts.is_empty());
        }

        #[test]
        fn test_org_scope_demotion_is_a_mismatch() {
            let members = vec![org_linked(UserId::new(), "alice", "owner")];
            let external = vec![collaborator("alice", ProviderPermission::named("member"))];
            let conflicts = partition(&org_scope(), &members, &external);
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].kind, ConflictKind::PermissionMismatch);
            assert_eq!(conflicts[0].expected_tier, Some(PermissionTier::Admin));
        }

        #[test]
        fn test_in_sync_group_members_compare_by_level() {
            let members = vec![org_linked(UserId::new(), "bob", "member")];
            let external = vec![collaborator("bob", ProviderPermission::level(30))];
            let conflicts = partition(&org_scope(), &members, &external);
            assert!(conflicts.is_empty());
        }
    }

    mod engine {
        use super::*;

        fn scope() -> SyncScope {
            SyncScope::Project(ProjectId::new())
        }

        fn setup(directory: FakeDirectory, host: FakeHost) -> (ConflictEngine, Arc<FakeHost>) {
            let host = Arc::new(host);
            let registry = ProviderRegistry::new().with(host.clone());
            (ConflictEngine::new(Arc::new(directory), registry), host)
        }

        #[tokio::test]
        async fn test_no_integration_detects_nothing() {
            let (engine, _) = setup(FakeDirectory::disconnected(), FakeHost::new(GitProvider::GitHub));
            let conflicts = engine.detect(&scope()).await.unwrap();
            assert!(conflicts.is_empty());
        }

        #[tokio::test]
        async fn test_unlinked_members_are_not_conflicts() {
            let user = UserId::new();
            let directory =
                FakeDirectory::connected(GitProvider::GitHub).with_member(user, "developer", None);
            let (engine, _) = setup(directory, FakeHost::new(GitProvider::GitHub));
            let conflicts = engine.detect(&scope()).await.unwrap();
            assert!(conflicts.is_empty());
        }

        #[tokio::test]
        async fn test_resolution_replays_internal_state() {
            let missing = UserId::new();
            let mismatched = UserId::new();
            let directory = FakeDirectory::connected(GitProvider::GitHub)
                .with_member(missing, "developer", Some("carol"))
                .with_member(mismatched, "maintainer", Some("alice"));
            let host = FakeHost::new(GitProvider::GitHub)
                .with_collaborator("alice", ProviderPermission::named("pull"))
                .with_collaborator("mallory", ProviderPermission::named("admin"));
            let (engine, host) = setup(directory, host);

            let scope = scope();
            let integration = GitIntegration {
                provider: GitProvider::GitHub,
                token: "test-token".into(),
                resource_id: "acme/widgets".into(),
                resource_type: "repository".into(),
            };
            let conflicts = engine.detect(&scope).await.unwrap();
            assert_eq!(conflicts.len(), 3);

            let report = engine
                .resolve_conflicts(&scope, &integration, conflicts, &ResolveOptions::default())
                .await
                .unwrap();

            assert_eq!(report.resolved, 2);
            assert_eq!(report.failed, 0);
            assert_eq!(report.skipped, 1);

            let collaborators = host.collaborators.lock().unwrap();
            assert_eq!(
                collaborators.get("carol"),
                Some(&ProviderPermission::named("write"))
            );
            assert_eq!(
                collaborators.get("alice"),
                Some(&ProviderPermission::named("admin"))
            );
            // Extra collaborators are untouched unless removal is opted into.
            assert!(collaborators.contains_key("mallory"));
            drop(collaborators);

            let skipped = report
                .details
                .iter()
                .find(|d| d.login == "mallory")
                .unwrap();
            assert_eq!(skipped.outcome, "potentially_dangerous");

            // The audit detail records the permission transition.
            let updated = report.details.iter().find(|d| d.login == "alice").unwrap();
            assert_eq!(updated.before, Some(ProviderPermission::named("pull")));
            assert_eq!(updated.after, Some(ProviderPermission::named("admin")));
            let added = report.details.iter().find(|d| d.login == "carol").unwrap();
            assert_eq!(added.before, None);
            assert_eq!(added.after, Some(ProviderPermission::named("write")));

            // A second pass finds nothing left to fix.
            let remaining = engine.detect(&scope).await.unwrap();
            assert_eq!(remaining.len(), 1);
            assert_eq!(remaining[0].kind, ConflictKind::ExtraExternally);
        }

        #[tokio::test]
        async fn test_opting_in_removes_extra_collaborators() {
            let directory = FakeDirectory::connected(GitProvider::GitHub);
            let host = FakeHost::new(GitProvider::GitHub)
                .with_collaborator("mallory", ProviderPermission::named("admin"));
            let (engine, host) = setup(directory, host);

            let scope = scope();
            let integration = GitIntegration {
                provider: GitProvider::GitHub,
                token: "test-token".into(),
                resource_id: "acme/widgets".into(),
                resource_type: "repository".into(),
            };
            let conflicts = engine.detect(&scope).await.unwrap();
            let options = ResolveOptions::default().with_kinds(vec![
                ConflictKind::PermissionMismatch,
                ConflictKind::MissingExternally,
                ConflictKind::ExtraExternally,
            ]);
            let report = engine
                .resolve_conflicts(&scope, &integration, conflicts, &options)
                .await
                .unwrap();

            assert_eq!(report.resolved, 1);
            assert!(host.collaborators.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_detect_only_writes_nothing() {
            let user = UserId::new();
            let directory = FakeDirectory::connected(GitProvider::GitHub)
                .with_member(user, "developer", Some("carol"));
            let (engine, host) = setup(directory, FakeHost::new(GitProvider::GitHub));

            let scope = scope();
            let integration = GitIntegration {
                provider: GitProvider::GitHub,
                token: "test-token".into(),
                resource_id: "acme/widgets".into(),
                resource_type: "repository".into(),
            };
            let conflicts = engine.detect(&scope).await.unwrap();
            let report = engine
                .resolve_conflicts(&scope, &integration, conflicts, &ResolveOptions::detect_only())
                .await
                .unwrap();

            assert_eq!(report.resolved, 0);
            assert_eq!(report.skipped, 1);
            assert!(host.collaborators.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_org_detection_settles_after_one_pass() {
            let owner = UserId::new();
            let member = UserId::new();
            let directory = FakeDirectory::connected(GitProvider::GitHub)
                .with_member(owner, "owner", Some("alice"))
                .with_member(member, "member", Some("bob"));
            // alice was demoted externally; bob is already in sync.
            let host = FakeHost::new(GitProvider::GitHub)
                .with_org_member("alice", ProviderPermission::named("member"))
                .with_org_member("bob", ProviderPermission::named("member"));
            let (engine, host) = setup(directory, host);

            let scope = SyncScope::Organization(OrgId::new());
            let integration = GitIntegration {
                provider: GitProvider::GitHub,
                token: "test-token".into(),
                resource_id: "acme".into(),
                resource_type: "organization".into(),
            };

            let conflicts = engine.detect(&scope).await.unwrap();
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].login, "alice");
            assert_eq!(conflicts[0].kind, ConflictKind::PermissionMismatch);

            let report = engine
                .resolve_conflicts(&scope, &integration, conflicts, &ResolveOptions::default())
                .await
                .unwrap();
            assert_eq!(report.resolved, 1);
            assert_eq!(
                host.org_members.lock().unwrap().get("alice"),
                Some(&ProviderPermission::named("admin"))
            );

            assert!(engine.detect(&scope).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_one_failure_does_not_stop_the_pass() {
            let a = UserId::new();
            let b = UserId::new();
            let directory = FakeDirectory::connected(GitProvider::GitHub)
                .with_member(a, "developer", Some("alice"))
                .with_member(b, "developer", Some("bob"));
            let host = FakeHost::new(GitProvider::GitHub);
            host.fail_login("alice", || {
                ProviderError::Server {
                    status: 502,
                    message: "bad gateway".into(),
                }
            });
            let (engine, host) = setup(directory, host);

            let scope = scope();
            let integration = GitIntegration {
                provider: GitProvider::GitHub,
                token: "test-token".into(),
                resource_id: "acme/widgets".into(),
                resource_type: "repository".into(),
            };
            let conflicts = engine.detect(&scope).await.unwrap();
            let report = engine
                .resolve_conflicts(&scope, &integration, conflicts, &ResolveOptions::default())
                .await
                .unwrap();

            assert_eq!(report.failed, 1);
            assert_eq!(report.resolved, 1);
            assert!(host.collaborators.lock().unwrap().contains_key("bob"));
        }
    }
}
