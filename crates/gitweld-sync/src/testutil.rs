//! In-memory fakes for the trait seams, shared by unit tests.

use crate::directory::{GitIntegration, LinkedAccount, MemberRecord, MembershipDirectory};
use crate::error::SyncResult;
use async_trait::async_trait;
use gitweld_core::{SyncScope, UserId};
use gitweld_provider::api::{AppliedChange, GitHostApi};
use gitweld_provider::{Collaborator, GitProvider, OrgMember, ProviderError, ProviderPermission, ProviderResult};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Fake system of record.
pub(crate) struct FakeDirectory {
    pub integration: Option<GitIntegration>,
    pub members: Vec<MemberRecord>,
    /// user uuid -> provider login
    pub accounts: HashMap<Uuid, String>,
}

impl FakeDirectory {
    pub fn disconnected() -> Self {
        Self {
            integration: None,
            members: Vec::new(),
            accounts: HashMap::new(),
        }
    }

    pub fn connected(provider: GitProvider) -> Self {
        Self {
            integration: Some(GitIntegration {
                provider,
                token: "test-token".into(),
                resource_id: "acme/widgets".into(),
                resource_type: "repository".into(),
            }),
            members: Vec::new(),
            accounts: HashMap::new(),
        }
    }

    pub fn with_member(mut self, user_id: UserId, role: &str, login: Option<&str>) -> Self {
        self.members.push(MemberRecord {
            user_id,
            role: role.to_string(),
        });
        if let Some(login) = login {
            self.accounts.insert(user_id.into_uuid(), login.to_string());
        }
        self
    }
}

#[async_trait]
impl MembershipDirectory for FakeDirectory {
    async fn integration(&self, _scope: &SyncScope) -> SyncResult<Option<GitIntegration>> {
        Ok(self.integration.clone())
    }

    async fn members(&self, _scope: &SyncScope) -> SyncResult<Vec<MemberRecord>> {
        Ok(self.members.clone())
    }

    async fn linked_account(
        &self,
        user_id: UserId,
        _provider: GitProvider,
    ) -> SyncResult<Option<LinkedAccount>> {
        Ok(self
            .accounts
            .get(user_id.as_uuid())
            .map(|login| LinkedAccount {
                login: login.clone(),
            }))
    }
}

type ErrorFactory = Box<dyn Fn() -> ProviderError + Send + Sync>;

/// Fake provider that tracks membership state in memory.
pub(crate) struct FakeHost {
    provider: GitProvider,
    pub collaborators: Mutex<HashMap<String, ProviderPermission>>,
    pub org_members: Mutex<HashMap<String, ProviderPermission>>,
    /// Logins whose writes fail with the produced error.
    fail_logins: Mutex<HashMap<String, ErrorFactory>>,
}

impl FakeHost {
    pub fn new(provider: GitProvider) -> Self {
        Self {
            provider,
            collaborators: Mutex::new(HashMap::new()),
            org_members: Mutex::new(HashMap::new()),
            fail_logins: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_collaborator(self, login: &str, permission: ProviderPermission) -> Self {
        self.collaborators
            .lock()
            .unwrap()
            .insert(login.to_string(), permission);
        self
    }

    pub fn with_org_member(self, login: &str, role: ProviderPermission) -> Self {
        self.org_members
            .lock()
            .unwrap()
            .insert(login.to_string(), role);
        self
    }

    pub fn fail_login<F>(&self, login: &str, factory: F)
    where
        F: Fn() -> ProviderError + Send + Sync + 'static,
    {
        self.fail_logins
            .lock()
            .unwrap()
            .insert(login.to_string(), Box::new(factory));
    }

    fn check_failure(&self, login: &str) -> ProviderResult<()> {
        if let Some(factory) = self.fail_logins.lock().unwrap().get(login) {
            return Err(factory());
        }
        Ok(())
    }
}

#[async_trait]
impl GitHostApi for FakeHost {
    fn provider(&self) -> GitProvider {
        self.provider
    }

    async fn add_collaborator(
        &self,
        _token: &str,
        _resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.check_failure(login)?;
        let existed = self
            .collaborators
            .lock()
            .unwrap()
            .insert(login.to_string(), permission.clone())
            .is_some();
        Ok(AppliedChange {
            login: login.to_string(),
            permission: permission.clone(),
            created: !existed,
        })
    }

    async fn update_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        let mut change = self
            .add_collaborator(token, resource, login, permission)
            .await?;
        change.created = false;
        Ok(change)
    }

    async fn remove_collaborator(
        &self,
        _token: &str,
        _resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.check_failure(login)?;
        self.collaborators.lock().unwrap().remove(login);
        Ok(())
    }

    async fn list_collaborators(
        &self,
        _token: &str,
        _resource: &str,
    ) -> ProviderResult<Vec<Collaborator>> {
        Ok(self
            .collaborators
            .lock()
            .unwrap()
            .iter()
            .map(|(login, permission)| Collaborator {
                login: login.clone(),
                permission: permission.clone(),
            })
            .collect())
    }

    async fn add_org_member(
        &self,
        _token: &str,
        _resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.check_failure(login)?;
        let existed = self
            .org_members
            .lock()
            .unwrap()
            .insert(login.to_string(), role.clone())
            .is_some();
        Ok(AppliedChange {
            login: login.to_string(),
            permission: role.clone(),
            created: !existed,
        })
    }

    async fn update_org_member_role(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        let mut change = self.add_org_member(token, resource, login, role).await?;
        change.created = false;
        Ok(change)
    }

    async fn remove_org_member(
        &self,
        _token: &str,
        _resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.check_failure(login)?;
        self.org_members.lock().unwrap().remove(login);
        Ok(())
    }

    async fn list_org_members(
        &self,
        _token: &str,
        _resource: &str,
    ) -> ProviderResult<Vec<OrgMember>> {
        Ok(self
            .org_members
            .lock()
            .unwrap()
            .iter()
            .map(|(login, role)| OrgMember {
                login: login.clone(),
                role: role.clone(),
            })
            .collect())
    }
}
