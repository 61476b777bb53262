//! Subject registry: the closed sets of actions and resource types, and the
//! attributes each resource type exposes to conditional rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Actions
// ═══════════════════════════════════════════════════════════════════════════════

/// A verb a rule grants or revokes.
///
/// `Manage` is the wildcard: a rule listing it matches every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Manage,
    Get,
    Create,
    Update,
    Delete,
    TransferOwnership,
}

impl Action {
    pub const fn all() -> [Action; 6] {
        [
            Action::Manage,
            Action::Get,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::TransferOwnership,
        ]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manage => "manage",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::TransferOwnership => "transfer_ownership",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action or resource type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectParseError {
    #[error("unknown action '{0}'")]
    Action(String),
    #[error("unknown resource type '{0}'")]
    ResourceType(String),
}

impl FromStr for Action {
    type Err = SubjectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Action::all()
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| SubjectParseError::Action(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Attributes
// ═══════════════════════════════════════════════════════════════════════════════

/// Primitive shape of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Non-empty identifier string.
    Identifier,
    /// Identifier string or null; the key must still be present.
    NullableIdentifier,
}

/// An attribute a resource type exposes to conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttributeKind,
}

const fn attr(name: &'static str, kind: AttributeKind) -> AttributeSpec {
    AttributeSpec { name, kind }
}

const ORGANIZATION_ATTRIBUTES: &[AttributeSpec] = &[
    attr("id", AttributeKind::Identifier),
    attr("ownerId", AttributeKind::NullableIdentifier),
];

const PROJECT_ATTRIBUTES: &[AttributeSpec] = &[
    attr("id", AttributeKind::Identifier),
    attr("ownerId", AttributeKind::NullableIdentifier),
];

const USER_ATTRIBUTES: &[AttributeSpec] = &[attr("id", AttributeKind::Identifier)];

const INVITE_ATTRIBUTES: &[AttributeSpec] = &[attr("id", AttributeKind::Identifier)];

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Types
// ═══════════════════════════════════════════════════════════════════════════════

/// A kind of resource rules can target. `All` matches every type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Organization,
    Project,
    User,
    Billing,
    Invite,
    #[serde(rename = "all")]
    All,
}

impl ResourceType {
    /// The concrete types, excluding the `all` sentinel.
    pub const fn concrete() -> [ResourceType; 5] {
        [
            ResourceType::Organization,
            ResourceType::Project,
            ResourceType::User,
            ResourceType::Billing,
            ResourceType::Invite,
        ]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Project => "Project",
            Self::User => "User",
            Self::Billing => "Billing",
            Self::Invite => "Invite",
            Self::All => "all",
        }
    }

    /// Attributes usable in conditions on this type.
    pub const fn attributes(&self) -> &'static [AttributeSpec] {
        match self {
            Self::Organization => ORGANIZATION_ATTRIBUTES,
            Self::Project => PROJECT_ATTRIBUTES,
            Self::User => USER_ATTRIBUTES,
            Self::Invite => INVITE_ATTRIBUTES,
            Self::Billing | Self::All => &[],
        }
    }

    pub fn declares(&self, attribute: &str) -> bool {
        self.attributes().iter().any(|a| a.name == attribute)
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether a rule on `self` applies to a query on `other`.
    pub fn covers(&self, other: ResourceType) -> bool {
        self.is_all() || *self == other
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = SubjectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Self::concrete()
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| SubjectParseError::ResourceType(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_str() {
        for action in Action::all() {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert_eq!(
            "transfer-ownership".parse::<Action>().unwrap(),
            Action::TransferOwnership
        );
        assert!("archive".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_serde_names() {
        assert_eq!(
            serde_json::to_string(&Action::TransferOwnership).unwrap(),
            "\"transfer_ownership\""
        );
    }

    #[test]
    fn test_resource_type_parse() {
        assert_eq!("project".parse::<ResourceType>().unwrap(), ResourceType::Project);
        assert_eq!("ALL".parse::<ResourceType>().unwrap(), ResourceType::All);
        assert!("Invoice".parse::<ResourceType>().is_err());
        assert_eq!(serde_json::to_string(&ResourceType::All).unwrap(), "\"all\"");
    }

    #[test]
    fn test_declared_attributes() {
        assert!(ResourceType::Organization.declares("ownerId"));
        assert!(ResourceType::Project.declares("id"));
        assert!(!ResourceType::User.declares("ownerId"));
        assert!(ResourceType::Billing.attributes().is_empty());
        assert!(ResourceType::All.attributes().is_empty());
    }

    #[test]
    fn test_all_covers_every_type() {
        for t in ResourceType::concrete() {
            assert!(ResourceType::All.covers(t));
            assert!(t.covers(t));
        }
        assert!(!ResourceType::Billing.covers(ResourceType::Project));
    }
}
