//! Provider boundary for the gitweld reconciliation engine.
//!
//! Everything provider-specific lives here: the typed [`GitHostApi`] trait
//! the engine programs against, the pure permission mapper, HTTP error
//! classification with retry/backoff policy, client-side rate limiting, and
//! the REST clients for the two supported provider models (a string-keyed
//! GitHub-style API and a numeric-level GitLab-style API).

pub mod api;
pub mod error;
pub mod github;
pub mod gitlab;
mod http;
pub mod mapping;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use api::{AppliedChange, GitHostApi, ProviderRegistry};
pub use error::{ProviderError, ProviderResult};
pub use github::{GithubClient, GithubConfig};
pub use gitlab::{GitlabClient, GitlabConfig};
pub use retry::BackoffPolicy;
pub use types::{Collaborator, GitProvider, OrgMember, ProviderPermission};
