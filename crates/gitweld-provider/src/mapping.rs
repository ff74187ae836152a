//! Permission mapping between internal tiers and provider-native values.
//!
//! All functions here are pure and total: any input string or level maps to
//! some tier, clamping unknown or out-of-range values down to the nearest
//! representable permission rather than failing.

use crate::types::{GitProvider, ProviderPermission};
use gitweld_core::PermissionTier;

/// GitLab access level granted for each tier.
pub const GITLAB_REPORTER: i64 = 20;
pub const GITLAB_DEVELOPER: i64 = 30;
pub const GITLAB_MAINTAINER: i64 = 40;
pub const GITLAB_OWNER: i64 = 50;

/// Map a tier to a GitLab access level.
///
/// `owner` grants the Owner level (50) instead of Maintainer (40) for the
/// admin tier; it has no effect on lower tiers.
#[must_use]
pub fn gitlab_level(tier: PermissionTier, owner: bool) -> i64 {
    match tier {
        PermissionTier::Admin if owner => GITLAB_OWNER,
        PermissionTier::Admin => GITLAB_MAINTAINER,
        PermissionTier::Write => GITLAB_DEVELOPER,
        PermissionTier::Read => GITLAB_REPORTER,
    }
}

/// Map a GitLab access level back to a tier, clamping unknown levels down.
#[must_use]
pub fn tier_from_gitlab_level(level: i64) -> PermissionTier {
    if level >= GITLAB_MAINTAINER {
        PermissionTier::Admin
    } else if level >= GITLAB_DEVELOPER {
        PermissionTier::Write
    } else {
        PermissionTier::Read
    }
}

/// Map a tier to a GitHub permission string.
#[must_use]
pub fn github_permission(tier: PermissionTier) -> &'static str {
    match tier {
        PermissionTier::Admin => "admin",
        PermissionTier::Write => "write",
        PermissionTier::Read => "read",
    }
}

/// Map a GitHub permission string back to a tier.
///
/// `maintain` clamps down to admin's tier and `triage` down to write's per
/// the closest internal equivalent; anything unrecognized degrades to read.
#[must_use]
pub fn tier_from_github_permission(permission: &str) -> PermissionTier {
    match permission.to_ascii_lowercase().as_str() {
        "admin" | "maintain" => PermissionTier::Admin,
        "write" | "triage" | "push" => PermissionTier::Write,
        _ => PermissionTier::Read,
    }
}

/// Map an internal org role to a GitHub organization role string.
#[must_use]
pub fn github_org_role(org_role: &str) -> &'static str {
    match org_role.to_ascii_lowercase().as_str() {
        "owner" | "admin" => "admin",
        _ => "member",
    }
}

/// Map a provider org role string back to a tier.
///
/// Org membership grants the write tier to regular members, so `member`
/// maps to Write, mirroring `PermissionTier::from_org_role`. Repo permission
/// strings clamp `member`-less values down to Read instead; the two reverse
/// mappings are intentionally different.
#[must_use]
pub fn tier_from_github_org_role(role: &str) -> PermissionTier {
    match role.to_ascii_lowercase().as_str() {
        "owner" | "admin" => PermissionTier::Admin,
        "member" => PermissionTier::Write,
        _ => PermissionTier::Read,
    }
}

/// Map a tier to the given provider's native permission value.
#[must_use]
pub fn to_provider_permission(
    provider: GitProvider,
    tier: PermissionTier,
    owner: bool,
) -> ProviderPermission {
    match provider {
        GitProvider::GitHub => ProviderPermission::named(github_permission(tier)),
        GitProvider::GitLab => ProviderPermission::level(gitlab_level(tier, owner)),
    }
}

/// Map a provider-native permission value back to a tier.
///
/// Dispatches on the value's representation, so a mis-tagged value still
/// resolves to a tier instead of failing.
#[must_use]
pub fn tier_from_permission(permission: &ProviderPermission) -> PermissionTier {
    match permission {
        ProviderPermission::Named(s) => tier_from_github_permission(s),
        ProviderPermission::Level(n) => tier_from_gitlab_level(*n),
    }
}

/// Map a provider-native org membership value back to a tier.
///
/// Like [`tier_from_permission`] but named values are read as org roles
/// rather than repository permissions.
#[must_use]
pub fn tier_from_org_permission(permission: &ProviderPermission) -> PermissionTier {
    match permission {
        ProviderPermission::Named(s) => tier_from_github_org_role(s),
        ProviderPermission::Level(n) => tier_from_gitlab_level(*n),
    }
}

/// Whether a string is a permission GitHub accepts on the collaborator API.
#[must_use]
pub fn is_valid_github_permission(permission: &str) -> bool {
    matches!(
        permission.to_ascii_lowercase().as_str(),
        "pull" | "triage" | "push" | "maintain" | "admin" | "read" | "write"
    )
}

/// Whether a number is a defined GitLab access level.
#[must_use]
pub fn is_valid_gitlab_level(level: i64) -> bool {
    matches!(level, 10 | 20 | 30 | 40 | 50)
}
