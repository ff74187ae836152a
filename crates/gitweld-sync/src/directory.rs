//! The system-of-record seam.
//!
//! Projects, organizations, memberships and linked Git accounts live in
//! stores owned by other parts of the platform. The engine reads them
//! through this trait; production wires in a database-backed implementation,
//! tests wire in fakes.

use crate::error::SyncResult;
use async_trait::async_trait;
use gitweld_core::{SyncScope, UserId};
use gitweld_provider::GitProvider;

/// A scoped entity's Git hosting integration.
#[derive(Debug, Clone)]
pub struct GitIntegration {
    /// Which provider the entity is connected to.
    pub provider: GitProvider,
    /// Access token for the integration. Owned by the integration, not by
    /// any one user.
    pub token: String,
    /// Provider-side resource id: repository full name or org login for the
    /// GitHub model, numeric project or group id for the GitLab model.
    pub resource_id: String,
    /// Provider-side resource kind tag for audit records, e.g. `repository`
    /// or `group`.
    pub resource_type: String,
}

/// A member of the scoped entity in the system of record.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub user_id: UserId,
    /// Internal role string, e.g. `developer` or `owner`.
    pub role: String,
}

/// A user's linked account on a specific provider.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    /// Provider-side login.
    pub login: String,
}

/// Read access to the system of record.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// The entity's integration, or `None` when it has no Git hosting
    /// connection (in which case sync is silently skipped).
    async fn integration(&self, scope: &SyncScope) -> SyncResult<Option<GitIntegration>>;

    /// Current members of the entity with their internal roles.
    async fn members(&self, scope: &SyncScope) -> SyncResult<Vec<MemberRecord>>;

    /// The user's linked account on the given provider, if any.
    async fn linked_account(
        &self,
        user_id: UserId,
        provider: GitProvider,
    ) -> SyncResult<Option<LinkedAccount>>;
}
