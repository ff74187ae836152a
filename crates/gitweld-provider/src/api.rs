//! The provider boundary trait the engine programs against.

use crate::error::ProviderResult;
use crate::types::{Collaborator, GitProvider, OrgMember, ProviderPermission};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Typed acknowledgement of a membership write.
///
/// Stored in the audit record's metadata in place of the provider's raw
/// response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    /// Provider-side login the change applied to.
    pub login: String,
    /// Permission now in effect, in the provider's native representation.
    pub permission: ProviderPermission,
    /// True when the provider reported a new grant rather than an update.
    pub created: bool,
}

/// Membership operations a Git hosting provider exposes.
///
/// Repository-collaborator writes are idempotent upserts on both provider
/// models: adding an existing collaborator updates their permission.
#[async_trait]
pub trait GitHostApi: Send + Sync {
    /// Which provider model this client speaks.
    fn provider(&self) -> GitProvider;

    /// Grant or update a collaborator's permission on a repository.
    async fn add_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange>;

    /// Update an existing collaborator's permission.
    async fn update_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange>;

    /// Revoke a collaborator's access. Removing a non-collaborator is a
    /// provider-side no-op.
    async fn remove_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()>;

    /// List current collaborators with their permissions.
    async fn list_collaborators(
        &self,
        token: &str,
        resource: &str,
    ) -> ProviderResult<Vec<Collaborator>>;

    /// Add a member to an organization or group with the given role.
    async fn add_org_member(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange>;

    /// Change an existing organization member's role.
    async fn update_org_member_role(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange>;

    /// Remove a member from an organization or group.
    async fn remove_org_member(
        &self,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()>;

    /// List current organization members with their roles.
    async fn list_org_members(&self, token: &str, resource: &str)
        -> ProviderResult<Vec<OrgMember>>;
}

/// Lookup table from provider model to its client.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<GitProvider, Arc<dyn GitHostApi>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, client: Arc<dyn GitHostApi>) -> Self {
        self.register(client);
        self
    }

    pub fn register(&mut self, client: Arc<dyn GitHostApi>) {
        self.clients.insert(client.provider(), client);
    }

    #[must_use]
    pub fn get(&self, provider: GitProvider) -> Option<Arc<dyn GitHostApi>> {
        self.clients.get(&provider).cloned()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
