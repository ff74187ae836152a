//! Internal roles and the provider-neutral permission tier.
//!
//! Role-to-tier mapping is total: unknown role strings degrade to the
//! least-privileged tier instead of failing, so a bad role in the system of
//! record can never abort a sync.

use crate::error::ParseValueError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Provider-neutral permission level.
///
/// Ordered by privilege: `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    Read,
    Write,
    Admin,
}

impl PermissionTier {
    /// Map an internal project role to a tier.
    ///
    /// Total over arbitrary input: unrecognized roles map to [`Read`].
    ///
    /// [`Read`]: PermissionTier::Read
    #[must_use]
    pub fn from_project_role(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "owner" | "maintainer" => Self::Admin,
            "developer" => Self::Write,
            _ => Self::Read,
        }
    }

    /// Map an internal organization role to a tier.
    ///
    /// Total over arbitrary input: unrecognized roles map to [`Read`].
    ///
    /// [`Read`]: PermissionTier::Read
    #[must_use]
    pub fn from_org_role(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "owner" | "admin" => Self::Admin,
            "member" => Self::Write,
            _ => Self::Read,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }
}

impl Display for PermissionTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionTier {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            other => Err(ParseValueError::new("permission tier", other)),
        }
    }
}

/// Role a user holds on a project in the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Maintainer,
    Developer,
    Viewer,
}

impl ProjectRole {
    /// Parse a role string, case-insensitively. Unknown roles yield `None`.
    #[must_use]
    pub fn parse(role: &str) -> Option<Self> {
        match role.to_ascii_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "maintainer" => Some(Self::Maintainer),
            "developer" => Some(Self::Developer),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Maintainer => "maintainer",
            Self::Developer => "developer",
            Self::Viewer => "viewer",
        }
    }

    #[must_use]
    pub fn tier(&self) -> PermissionTier {
        PermissionTier::from_project_role(self.as_str())
    }
}

impl Display for ProjectRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a user holds in an organization in the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
    Billing,
}

impl OrgRole {
    /// Parse a role string, case-insensitively. Unknown roles yield `None`.
    #[must_use]
    pub fn parse(role: &str) -> Option<Self> {
        match role.to_ascii_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "billing" => Some(Self::Billing),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Billing => "billing",
        }
    }

    #[must_use]
    pub fn tier(&self) -> PermissionTier {
        PermissionTier::from_org_role(self.as_str())
    }
}

impl Display for OrgRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod tier_ordering {
        use super::*;

        #[test]
        fn test_read_below_write_below_admin() {
            assert!(PermissionTier::Read < PermissionTier::Write);
            assert!(PermissionTier::Write < PermissionTier::Admin);
        }

        #[test]
        fn test_display_from_str_roundtrip() {
            for tier in [
                PermissionTier::Read,
                PermissionTier::Write,
                PermissionTier::Admin,
            ] {
                let parsed: PermissionTier = tier.to_string().parse().unwrap();
                assert_eq!(parsed, tier);
            }
        }

        #[test]
        fn test_from_str_rejects_unknown() {
            assert!("superadmin".parse::<PermissionTier>().is_err());
        }
    }

    mod project_role_mapping {
        use super::*;

        #[test]
        fn test_known_roles() {
            assert_eq!(
                PermissionTier::from_project_role("owner"),
                PermissionTier::Admin
            );
            assert_eq!(
                PermissionTier::from_project_role("maintainer"),
                PermissionTier::Admin
            );
            assert_eq!(
                PermissionTier::from_project_role("developer"),
                PermissionTier::Write
            );
            assert_eq!(
                PermissionTier::from_project_role("viewer"),
                PermissionTier::Read
            );
        }

        #[test]
        fn test_case_insensitive() {
            assert_eq!(
                PermissionTier::from_project_role("Owner"),
                PermissionTier::Admin
            );
            assert_eq!(
                PermissionTier::from_project_role("DEVELOPER"),
                PermissionTier::Write
            );
        }

        #[test]
        fn test_unknown_role_defaults_to_read() {
            assert_eq!(
                PermissionTier::from_project_role("superuser"),
                PermissionTier::Read
            );
            assert_eq!(PermissionTier::from_project_role(""), PermissionTier::Read);
        }

        #[test]
        fn test_typed_role_agrees_with_string_mapping() {
            for role in [
                ProjectRole::Owner,
                ProjectRole::Maintainer,
                ProjectRole::Developer,
                ProjectRole::Viewer,
            ] {
                assert_eq!(role.tier(), PermissionTier::from_project_role(role.as_str()));
            }
        }
    }

    mod org_role_mapping {
        use super::*;

        #[test]
        fn test_known_roles() {
            assert_eq!(PermissionTier::from_org_role("owner"), PermissionTier::Admin);
            assert_eq!(PermissionTier::from_org_role("admin"), PermissionTier::Admin);
            assert_eq!(
                PermissionTier::from_org_role("member"),
                PermissionTier::Write
            );
            assert_eq!(
                PermissionTier::from_org_role("billing"),
                PermissionTier::Read
            );
        }

        #[test]
        fn test_unknown_role_defaults_to_read() {
            assert_eq!(
                PermissionTier::from_org_role("auditor"),
                PermissionTier::Read
            );
        }

        #[test]
        fn test_parse_unknown_is_none() {
            assert!(OrgRole::parse("auditor").is_none());
            assert_eq!(OrgRole::parse("Billing"), Some(OrgRole::Billing));
        }
    }
}
