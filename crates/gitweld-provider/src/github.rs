//! REST client for the string-keyed (GitHub-style) provider model.

use crate::api::{AppliedChange, GitHostApi};
use crate::error::{ProviderError, ProviderResult};
use crate::http::error_from_response;
use crate::mapping::{github_permission, tier_from_gitlab_level};
use crate::rate_limit::TokenBucket;
use crate::types::{Collaborator, GitProvider, OrgMember, ProviderPermission};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUESTS_PER_MINUTE: u64 = 900;
const ACCEPT_HEADER: &str = "application/vnd.github+json";
const USER_AGENT: &str = "gitweld";

/// Configuration for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_minute: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}

impl GithubConfig {
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

/// Client for the GitHub-style collaborator and org membership API.
///
/// `resource` is the repository full name (`owner/repo`) for collaborator
/// calls and the organization login for org calls. Tokens are passed per
/// call; they belong to the integration, not the client.
#[derive(Debug)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    limiter: TokenBucket,
}

#[derive(Debug, Deserialize)]
struct CollaboratorDto {
    login: String,
    #[serde(default)]
    role_name: Option<String>,
    #[serde(default)]
    permissions: Option<PermissionFlags>,
}

#[derive(Debug, Deserialize)]
struct PermissionFlags {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    maintain: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    triage: bool,
}

#[derive(Debug, Deserialize)]
struct MemberDto {
    login: String,
}

#[derive(Debug, Deserialize)]
struct MembershipDto {
    #[serde(default)]
    state: Option<String>,
    role: String,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> ProviderResult<Self> {
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

    /// The permission string sent on the wire, converting a numeric level
    /// through its tier when a GitLab-shaped value slips in.
    fn permission_value(permission: &ProviderPermission) -> String {
        match permission {
            ProviderPermission::Named(s) => s.clone(),
            ProviderPermission::Level(n) => github_permission(tier_from_gitlab_level(*n)).to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn put_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.limiter.acquire().await;
        let value = Self::permission_value(permission);
        let response = self
            .http
            .put(self.url(&format!("/repos/{resource}/collaborators/{login}")))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "permission": value }))
            .send()
            .await?;

        match response.status().as_u16() {
            // 201: invitation created; 204: permission updated in place.
            201 => Ok(AppliedChange {
                login: login.to_string(),
                permission: ProviderPermission::named(value),
                created: true,
            }),
            204 => Ok(AppliedChange {
                login: login.to_string(),
                permission: ProviderPermission::named(value),
                created: false,
            }),
            _ => Err(error_from_response(response).await),
        }
    }
}

#[async_trait]
impl GitHostApi for GithubClient {
    fn provider(&self) -> GitProvider {
        GitProvider::GitHub
    }

    async fn add_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.put_collaborator(token, resource, login, permission).await
    }

    async fn update_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        permission: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        // Same endpoint; the provider upserts.
        self.put_collaborator(token, resource, login, permission).await
    }

    async fn remove_collaborator(
        &self,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.limiter.acquire().await;
        let response = self
            .http
            .delete(self.url(&format!("/repos/{resource}/collaborators/{login}")))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn list_collaborators(
        &self,
        token: &str,
        resource: &str,
    ) -> ProviderResult<Vec<Collaborator>> {
        self.limiter.acquire().await;
        let response = self
            .http
            .get(self.url(&format!("/repos/{resource}/collaborators")))
            .query(&[("per_page", "100"), ("affiliation", "all")])
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let rows: Vec<CollaboratorDto> = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let permission = row
                    .role_name
                    .unwrap_or_else(|| permission_from_flags(row.permissions.as_ref()));
                Collaborator {
                    login: row.login,
                    permission: ProviderPermission::named(permission),
                }
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
        self.update_org_member_role(token, resource, login, role).await
    }

    async fn update_org_member_role(
        &self,
        token: &str,
        resource: &str,
        login: &str,
        role: &ProviderPermission,
    ) -> ProviderResult<AppliedChange> {
        self.limiter.acquire().await;
        let value = Self::permission_value(role);
        let response = self
            .http
            .put(self.url(&format!("/orgs/{resource}/memberships/{login}")))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "role": value }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let membership: MembershipDto = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        Ok(AppliedChange {
            login: login.to_string(),
            permission: ProviderPermission::named(membership.role),
            created: membership.state.as_deref() == Some("pending"),
        })
    }

    async fn remove_org_member(
        &self,
        token: &str,
        resource: &str,
        login: &str,
    ) -> ProviderResult<()> {
        self.limiter.acquire().await;
        let response = self
            .http
            .delete(self.url(&format!("/orgs/{resource}/members/{login}")))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn list_org_members(
        &self,
        token: &str,
        resource: &str,
    ) -> ProviderResult<Vec<OrgMember>> {
        // The members list endpoint does not carry roles; query each role
        // bucket separately.
        let mut members = Vec::new();
        for role in ["admin", "member"] {
            self.limiter.acquire().await;
            let response = self
                .http
                .get(self.url(&format!("/orgs/{resource}/members")))
                .query(&[("per_page", "100"), ("role", role)])
                .bearer_auth(token)
                .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let rows: Vec<MemberDto> = response
                .json()
                .await
                .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

            members.extend(rows.into_iter().map(|row| OrgMember {
                login: row.login,
                role: ProviderPermission::named(role),
            }));
        }
        Ok(members)
    }
}

/// Collapse the permission flag object into its strongest named permission.
fn permission_from_flags(flags: Option<&PermissionFlags>) -> String {
    match flags {
        Some(f) if f.admin => "admin",
        Some(f) if f.maintain => "maintain",
        Some(f) if f.push => "write",
        Some(f) if f.triage => "triage",
        _ => "read",
    }
    .to_string()
}
