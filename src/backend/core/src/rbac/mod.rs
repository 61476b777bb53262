//! Role-based access control for organizations.
//!
//! This module provides:
//! - **Subjects**: the closed sets of actions and resource types
//! - **Conditions**: data-described attribute predicates
//! - **Abilities**: ordered rule lists evaluated with last-match-wins semantics
//! - **Roles**: the ADMIN, MEMBER and BILLING permission functions
//! - **Schemas**: validation of resource instances before conditional checks
//! - **Middleware**: caller identification and per-organization context
//!
//! # Usage
//!
//! ```rust,ignore
//! use saas_core::rbac::{define_ability_for, Action, OrganizationSubject, Role, SubjectSchema, User};
//!
//! let ability = define_ability_for(&User::new("123"), Role::Admin)?;
//! let org = OrganizationSubject { id: "o1".into(), owner_id: Some("123".into()) }.parse()?;
//!
//! if ability.cannot(Action::Update, &org) {
//!     return Err(AppError::forbidden("You are not allowed to update this organization."));
//! }
//! ```

pub mod ability;
pub mod condition;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod roles;
pub mod schemas;
pub mod subjects;

pub use ability::{Ability, AbilityBuilder, Effect, Rule, Subject};
pub use condition::{Condition, FieldPredicate, MissingAttribute, Operator};
pub use middleware::{
    CurrentUser, IdentifyCallerLayer, MembershipContext, MembershipResolver, RbacContext,
    DEFAULT_USER_ID_HEADER,
};
pub use models::{
    Membership, MembershipId, Organization, OrganizationId, Role, User, UserId, UserProfile,
};
pub use policy::{define_ability_for, EvaluationSettings, PolicyEngine, PolicyError};
pub use roles::{PermissionsByRole, RoleCatalog};
pub use schemas::{
    parse_subject, InviteSubject, OrganizationSubject, ProjectSubject, ResourceInstance,
    SubjectSchema, UserSubject,
};
pub use subjects::{Action, ResourceType};
