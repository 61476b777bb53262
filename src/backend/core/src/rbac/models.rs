//! RBAC data models: identifiers, roles, users, memberships and organizations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Strongly-typed user identifier.
    UserId
);

string_id!(
    /// Strongly-typed organization identifier.
    OrganizationId
);

string_id!(
    /// Strongly-typed membership identifier.
    MembershipId
);

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// The closed set of roles a membership can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Member,
    Billing,
}

impl Role {
    /// Every role, in catalog order.
    pub const fn all() -> [Role; 3] {
        [Role::Admin, Role::Member, Role::Billing]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
            Self::Billing => "BILLING",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full access; organization update and ownership transfer only for the owner",
            Self::Member => "Reads users, creates and reads projects, edits own projects",
            Self::Billing => "Manages billing only",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected one of ADMIN, MEMBER, BILLING)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "MEMBER" => Ok(Self::Member),
            "BILLING" => Ok(Self::Billing),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership & User
// ═══════════════════════════════════════════════════════════════════════════════

/// Pairs a user with an organization and the role they hold there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: UserId, organization_id: OrganizationId, role: Role) -> Self {
        Self {
            id: MembershipId::generate(),
            user_id,
            organization_id,
            role,
            created_at: Utc::now(),
        }
    }
}

/// An authenticated identity and the memberships it holds.
///
/// Abilities are always built for one (user, role) pair; callers pick the
/// membership in play with [`User::role_in`] first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            memberships: Vec::new(),
        }
    }

    pub fn with_membership(mut self, membership: Membership) -> Self {
        self.memberships.push(membership);
        self
    }

    /// The user's effective role in an organization, if a member.
    pub fn role_in(&self, organization_id: &OrganizationId) -> Option<Role> {
        self.memberships
            .iter()
            .find(|m| &m.organization_id == organization_id)
            .map(|m| m.role)
    }
}

/// Public profile data for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Organization
// ═══════════════════════════════════════════════════════════════════════════════

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub should_attach_users_by_domain: bool,
    pub avatar_url: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: OrganizationId::generate(),
            name: name.into(),
            slug: slug.into(),
            domain: None,
            should_attach_users_by_domain: false,
            avatar_url: None,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.owner_id == user_id
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_uses_screaming_case() {
        let json = serde_json::to_string(&Role::Billing).unwrap();
        assert_eq!(json, "\"BILLING\"");
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_all_is_complete() {
        let roles = Role::all();
        assert_eq!(roles.len(), 3);
        for role in roles {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_user_role_in() {
        let org_a = OrganizationId::new("org-a");
        let org_b = OrganizationId::new("org-b");
        let user = User::new("123")
            .with_membership(Membership::new(UserId::new("123"), org_a.clone(), Role::Billing));

        assert_eq!(user.role_in(&org_a), Some(Role::Billing));
        assert_eq!(user.role_in(&org_b), None);
    }

    #[test]
    fn test_identifiers_serialize_transparently() {
        let id = UserId::new("u-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u-1\"");
        assert_eq!(id.to_string(), "u-1");
        assert_ne!(OrganizationId::generate(), OrganizationId::generate());
    }

    #[test]
    fn test_organization_ownership() {
        let org = Organization::new("Acme", "acme", UserId::new("owner"));
        assert!(org.is_owned_by(&UserId::new("owner")));
        assert!(!org.is_owned_by(&UserId::new("other")));
    }
}
