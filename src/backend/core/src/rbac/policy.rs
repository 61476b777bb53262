//! Policy engine: builds abilities from the role catalog.
//!
//! The engine answers "what may user U do while acting as role R?" by
//! running R's permission function for U and freezing the result into an
//! [`Ability`]. Abilities are built per request and never cached.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::ability::{Ability, AbilityBuilder};
use super::condition::MissingAttribute;
use super::models::{OrganizationId, Role, User, UserId};
use super::roles::RoleCatalog;
use super::subjects::ResourceType;
use crate::error::AppError;
use crate::validation::ValidationErrors;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from building or evaluating abilities.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Role {0} has no permission function registered")]
    RoleNotRegistered(Role),

    #[error("Role {0} produces an empty rule set")]
    EmptyRuleSet(Role),

    #[error("Role {role} conditions on '{attribute}', which {resource_type} does not declare")]
    UndeclaredAttribute {
        role: Role,
        resource_type: ResourceType,
        attribute: String,
    },

    #[error("{resource_type} instance is missing attribute '{attribute}'")]
    MissingAttribute {
        resource_type: ResourceType,
        attribute: String,
    },

    #[error("User {user} is not a member of organization {organization}")]
    NoMembership {
        user: UserId,
        organization: OrganizationId,
    },

    #[error("Invalid subject: {0}")]
    Validation(#[from] ValidationErrors),
}

impl PolicyError {
    /// Faults in the catalog itself rather than in a request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::RoleNotRegistered(_) | Self::EmptyRuleSet(_) | Self::UndeclaredAttribute { .. }
        )
    }
}

impl From<PolicyError> for AppError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Validation(errors) => AppError::from(errors),
            PolicyError::NoMembership { .. } => {
                AppError::unauthorized("You're not a member of this organization.")
                    .with_internal_message(err.to_string())
                    .with_source(err)
            }
            PolicyError::MissingAttribute { .. } => {
                AppError::evaluation(err.to_string()).with_source(err)
            }
            _ => AppError::configuration(err.to_string()).with_source(err),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════════════════

/// Knobs applied to every ability the engine builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSettings {
    pub missing_attribute: MissingAttribute,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Policy Engine
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds abilities from a role catalog.
///
/// Cheap to clone and safe to share across request tasks.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    catalog: Arc<RoleCatalog>,
    settings: EvaluationSettings,
}

impl PolicyEngine {
    pub fn new(catalog: RoleCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            settings: EvaluationSettings::default(),
        }
    }

    /// Engine over the built-in roles with default settings.
    pub fn standard() -> Self {
        Self::new(RoleCatalog::standard().clone())
    }

    pub fn with_settings(mut self, settings: EvaluationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> EvaluationSettings {
        self.settings
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ability construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the ability of `user` acting as `role`.
    pub fn build_ability(&self, user: &User, role: Role) -> Result<Ability, PolicyError> {
        let permissions = self
            .catalog
            .get(role)
            .ok_or(PolicyError::RoleNotRegistered(role))?;

        let mut builder = AbilityBuilder::new();
        permissions(user, &mut builder);
        let ability = builder.build(self.settings);

        debug!(
            user_id = %user.id,
            role = %role,
            rules = ability.len(),
            "Built ability"
        );
        Ok(ability)
    }

    /// Build the ability of `user` under their membership in `organization_id`.
    pub fn build_ability_in(
        &self,
        user: &User,
        organization_id: &OrganizationId,
    ) -> Result<Ability, PolicyError> {
        let role = user
            .role_in(organization_id)
            .ok_or_else(|| PolicyError::NoMembership {
                user: user.id.clone(),
                organization: organization_id.clone(),
            })?;
        self.build_ability(user, role)
    }

    /// Ability for a bare user id; no memberships are consulted.
    pub fn user_permissions(
        &self,
        user_id: impl Into<UserId>,
        role: Role,
    ) -> Result<Ability, PolicyError> {
        self.build_ability(&User::new(user_id), role)
    }

    /// Validate the catalog. Run once at startup.
    pub fn validate_catalog(&self) -> Result<(), PolicyError> {
        self.catalog.validate()?;
        info!(roles = self.catalog.roles().len(), "Role catalog validated");
        Ok(())
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::standard()
    }
}

/// Ability of `user` as `role` under the standard catalog.
pub fn define_ability_for(user: &User, role: Role) -> Result<Ability, PolicyError> {
    PolicyEngine::standard().build_ability(user, role)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rbac::models::Membership;
    use crate::rbac::schemas::{OrganizationSubject, ProjectSubject, SubjectSchema};
    use crate::rbac::subjects::Action;

    fn project(id: &str, owner: Option<&str>) -> crate::rbac::schemas::ResourceInstance {
        ProjectSubject {
            id: id.into(),
            owner_id: owner.map(String::from),
        }
        .parse()
        .unwrap()
    }

    fn organization(id: &str, owner: Option<&str>) -> crate::rbac::schemas::ResourceInstance {
        OrganizationSubject {
            id: id.into(),
            owner_id: owner.map(String::from),
        }
        .parse()
        .unwrap()
    }

    #[test]
    fn test_member_owns_project() {
        let ability = define_ability_for(&User::new("123"), Role::Member).unwrap();

        assert!(ability.can(Action::Delete, &project("p1", Some("123"))));
        assert!(ability.cannot(Action::Delete, &project("p2", Some("999"))));
        assert!(ability.cannot(Action::Update, &project("p3", None)));
    }

    #[test]
    fn test_member_type_level() {
        let ability = define_ability_for(&User::new("123"), Role::Member).unwrap();

        assert!(ability.can(Action::Create, ResourceType::Project));
        assert!(ability.can(Action::Get, ResourceType::User));
        assert!(ability.cannot(Action::Delete, ResourceType::Project));
        assert!(ability.cannot(Action::Get, ResourceType::Billing));
        assert!(ability.cannot(Action::Update, ResourceType::User));
    }

    #[test]
    fn test_admin_org_ownership() {
        let ability = define_ability_for(&User::new("123"), Role::Admin).unwrap();

        assert!(ability.can(Action::Update, &organization("o1", Some("123"))));
        assert!(ability.cannot(Action::Update, &organization("o2", Some("999"))));
        assert!(ability.can(Action::TransferOwnership, &organization("o1", Some("123"))));
        assert!(ability.cannot(Action::TransferOwnership, &organization("o2", Some("999"))));
        assert!(ability.cannot(Action::Update, &organization("o3", None)));
        assert!(ability.can(Action::Delete, &organization("o2", Some("999"))));
        assert!(ability.cannot(Action::Update, ResourceType::Organization));
    }

    #[test]
    fn test_admin_manages_everything_else() {
        let ability = define_ability_for(&User::new("123"), Role::Admin).unwrap();

        for action in Action::all() {
            assert!(ability.can(action, ResourceType::Project));
            assert!(ability.can(action, ResourceType::Billing));
            assert!(ability.can(action, &project("p2", Some("999"))));
        }
    }

    #[test]
    fn test_billing_is_isolated() {
        let ability = define_ability_for(&User::new("123"), Role::Billing).unwrap();

        assert!(ability.can(Action::Get, ResourceType::Billing));
        assert!(ability.can(Action::Update, ResourceType::Billing));
        assert!(ability.cannot(Action::Get, ResourceType::Project));
        assert!(ability.cannot(Action::Get, ResourceType::Organization));
        assert!(ability.cannot(Action::Get, ResourceType::User));
    }

    #[test]
    fn test_build_ability_in_resolves_membership() {
        let org = OrganizationId::new("org-1");
        let user = User::new("123")
            .with_membership(Membership::new(UserId::new("123"), org.clone(), Role::Member));
        let engine = PolicyEngine::standard();

        let ability = engine.build_ability_in(&user, &org).unwrap();
        assert!(ability.can(Action::Create, ResourceType::Project));

        let err = engine
            .build_ability_in(&user, &OrganizationId::new("org-2"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::NoMembership { .. }));
        assert_eq!(AppError::from(err).code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_unregistered_role() {
        let engine = PolicyEngine::new(RoleCatalog::empty());
        let err = engine.user_permissions("123", Role::Admin).unwrap_err();
        assert!(err.is_configuration());
        assert!(engine.validate_catalog().is_err());
        assert_eq!(AppError::from(err).code(), ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_settings_flow_into_abilities() {
        let engine = PolicyEngine::standard().with_settings(EvaluationSettings {
            missing_attribute: MissingAttribute::Fail,
        });
        let ability = engine.user_permissions("123", Role::Member).unwrap();
        assert_eq!(ability.settings().missing_attribute, MissingAttribute::Fail);
    }

    #[test]
    fn test_policy_error_mapping() {
        let missing = PolicyError::MissingAttribute {
            resource_type: ResourceType::Project,
            attribute: "ownerId".into(),
        };
        assert!(!missing.is_configuration());
        assert_eq!(AppError::from(missing).code(), ErrorCode::EvaluationError);

        let mut errors = ValidationErrors::new();
        errors.add_required("id");
        let app = AppError::from(PolicyError::Validation(errors));
        assert_eq!(app.code(), ErrorCode::ValidationError);
        assert!(app.field_errors().unwrap().contains_key("id"));
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyEngine>();
        assert_send_sync::<Ability>();
    }
}
