//! REST client for the numeric-level (GitLab-style) provider model.

use crate::api::{AppliedChange, GitHostApi};
use crate::error::{ProviderError, ProviderResult};
use crate::http::error_from_response;
use crate::mapping::{gitlab_level, tier_from_github_permission};
use crate::rate_limit::TokenBucket;
use crate::types::{Collaborator, GitProvider, OrgMember, ProviderPermission};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUESTS_PER_MINUTE: u64 = 600;
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Membership scope within the provider: repository project or group.
#[derive(Debug, Clone, Copy)]
enum MemberScope {
    Project,
    Group,
}

impl MemberScope {
    fn segment(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Group => "groups",
        }
    }
}

/// Configuration for [`GitlabClient`].
#[derive(Debug, Clone)]
pub struct GitlabConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_minute: u64,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}

impl GitlabConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_requests_per_minute(mut self, requests_per_minute: u64) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }
}

/// Client for the GitLab-style project and group membership API.
///
/// `resource` is the numeric project or group id, or a URL-encoded path.
#[derive(Debug)]
pub struct GitlabClient {
    http: reqwest::Client,
    base_url: String,
    limiter: TokenBucket,
}

#[derive(Debug, Deserialize)]
struct MemberDto {
    username: String,
    access_level: i64,
}

impl GitlabClient {
    pub fn new(config: GitlabConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::configuration(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: TokenBucket::per_minute(config.requests_per_minute),
        })
    }

    /// The access level sent on the wire, converting a named (GitHub-shaped)
    /// value through its tier when one slips in.
    fn level_value(permission: &ProviderPermission) -> i64 {
        match permission {
            ProviderPermission::Level(n) => *n,
            ProviderPermission::Named(s) => gitlab_level(tier_from_github_permission(s), false),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn add_member(
        &self,
        scope: MemberScope,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.limiter.acquire().await;
        let level = Self::level_value(permission);
        let response = self
            .http
            .post(self.url(&format!("/{}/{resource}/members", scope.segment())))
            .header(TOKEN_HEADER, token)
            .json(&json!({ "username": login, "access_level": level }))
            .send()
            .await?;

        match response.status().as_u16() {
            201 => Ok(AppliedChange {
                login: login.to_string(),
                permission: ProviderPermission::level(level),
                created: true,
            }),
            // Already a member: the add degrades to a level update.
            409 => self.update_member(scope, token, resource, login, permission).await,
            _ => Err(error_from_response(response).await),
        }
    }

    async fn update_member(
        &self,
        scope: MemberScope,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.limiter.acquire().await;
        let level = Self::level_value(permission);
        let response = self
            .http
            .put(self.url(&format!("/{}/{resource}/members/{login}", scope.segment())))
            .header(TOKEN_HEADER, token)
            .json(&json!({ "access_level": level }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(AppliedChange {
                login: login.to_string(),
                permission: ProviderPermission::level(level),
                created: false,
            })
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn remove_member(
        &self,
        scope: MemberScope,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.limiter.acquire().await;
        let response = self
            .http
            .delete(self.url(&format!("/{}/{resource}/members/{login}", scope.segment())))
            .header(TOKEN_HEADER, token)
            .send()
            .await?;

        match response.status().as_u16() {
            s if (200..300).contains(&s) => Ok(()),
            // Not a member: removal is a no-op.
            404 => {
                debug!(login, resource, "remove: not a member, treating as no-op");
                Ok(())
            }
            _ => Err(error_from_response(response).await),
        }
    }

    async fn list_members(
        &self,
        scope: MemberScope,
        token: &str,
        resource: &str,
    ) -> ProviderResult<Vec<MemberDto>> {
        self.limiter.acquire().await;
        let response = self
            .http
            .get(self.url(&format!("/{}/{resource}/members/all", scope.segment())))
            .query(&[("per_page", "100")])
            .header(TOKEN_HEADER, token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))
    }
}

#[async_trait]
impl GitHostApi for GitlabClient {
    fn provider(&self) -> GitProvider {
        GitProvider::GitLab
    }

    async fn add_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.add_member(MemberScope::Project, token, resource, login, permission)
            .await
    }

    async fn update_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.update_member(MemberScope::Project, token, resource, login, permission)
            .await
    }

    async fn remove_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.remove_member(MemberScope::Project, token, resource, login)
            .await
    }

    async fn list_collaborators(
        &self,
        token: &str,
        resource: &str,
    ) -> ProviderResult<Vec<Collaborator>> {
        let rows = self.list_members(MemberScope::Project, token, resource).await?;
        Ok(rows
            .into_iter()
            .map(|row| Collaborator {
                login: row.username,
                permission: ProviderPermission::level(row.access_level),
            })
            .collect())
    }

    async fn add_org_member(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.add_member(MemberScope::Group, token, resource, login, role)
            .await
    }

    async fn update_org_member_role(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.update_member(MemberScope::Group, token, resource, login, role)
            .await
    }

    async fn remove_org_member(
        &self,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.remove_member(MemberScope::Group, token, resource, login)
            .await
    }

    async fn list_org_members(
        &self,
        token: &str,
        resource: &str,
    ) -> ProviderResult<Vec<OrgMember>> {
        let rows = self.list_members(MemberScope::Group, token, resource).await?;
        Ok(rows
            .into_iter()
            .map(|row| OrgMember {
                login: row.username,
                role: ProviderPermission::level(row.access_level),
            })
            .collect())
    }
}
