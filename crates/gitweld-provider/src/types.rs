//! Typed provider wire objects.
//!
//! Adapter responses are parsed into these types at the boundary; raw JSON
//! never crosses into the engine.

use gitweld_core::ParseValueError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The two supported provider models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    /// String-keyed permissions (`read`/`triage`/`write`/`maintain`/`admin`).
    GitHub,
    /// Numeric access levels (10..=50).
    GitLab,
}

impl GitProvider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        }
    }
}

impl Display for GitProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GitProvider {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            other => Err(ParseValueError::new("git provider", other)),
        }
    }
}

/// A provider-side permission value in its native representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "repr", content = "value", rename_all = "snake_case")]
pub enum ProviderPermission {
    /// Named permission string (GitHub model).
    Named(String),
    /// Numeric access level (GitLab model).
    Level(i64),
}

impl ProviderPermission {
    pub fn named(value: impl Into<String>) -> Self {
        Self::Named(value.into())
    }

    #[must_use]
    pub fn level(value: i64) -> Self {
        Self::Level(value)
    }
}

impl Display for ProviderPermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(s) => f.write_str(s),
            Self::Level(n) => write!(f, "{n}"),
        }
    }
}

/// A collaborator as reported by a provider's list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    /// Provider-side login.
    pub login: String,
    /// Current permission in the provider's native representation.
    pub permission: ProviderPermission,
}

/// An organization or group member as reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMember {
    /// Provider-side login.
    pub login: String,
    /// Current role in the provider's native representation.
    pub role: ProviderPermission,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("github".parse::<GitProvider>().unwrap(), GitProvider::GitHub);
        assert_eq!("GitLab".parse::<GitProvider>().unwrap(), GitProvider::GitLab);
        assert!("bitbucket".parse::<GitProvider>().is_err());
    }

    #[test]
    fn test_permission_serde_tagged() {
        let named = ProviderPermission::named("write");
        let json = serde_json::to_value(&named).unwrap();
        assert_eq!(json["repr"], "named");
        assert_eq!(json["value"], "write");

        let level = ProviderPermission::level(30);
        let json = serde_json::to_value(&level).unwrap();
        assert_eq!(json["repr"], "level");
        assert_eq!(json["value"], 30);
    }

    #[test]
    fn test_permission_display() {
        assert_eq!(ProviderPermission::named("admin").to_string(), "admin");
        assert_eq!(ProviderPermission::level(40).to_string(), "40");
    }
}
