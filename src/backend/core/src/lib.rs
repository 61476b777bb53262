#![allow(clippy::result_large_err)]
//! # SaaS Core
//!
//! Role-based authorization for a multi-tenant SaaS backend.
//!
//! ## Architecture
//!
//! - **RBAC**: Ability engine with ordered allow/deny rules, attribute
//!   conditions and a catalog of per-role permission functions
//! - **Store**: Organization and membership persistence behind an async trait
//! - **API**: Axum routes that authorize every organization mutation
//! - **Validation**: Request validation with per-field error reporting
//! - **Telemetry**: Structured logging and Prometheus metrics
//!
//! ```rust
//! use saas_core::rbac::{define_ability_for, parse_subject, Action, ResourceType, Role, User};
//! use serde_json::json;
//!
//! let user = User::new("123");
//! let ability = define_ability_for(&user, Role::Admin).unwrap();
//!
//! let org = parse_subject(ResourceType::Organization, &json!({ "id": "1", "ownerId": "123" })).unwrap();
//! assert!(ability.can(Action::Update, &org));
//! assert!(ability.cannot(Action::TransferOwnership, ResourceType::Organization));
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod rbac;
pub mod store;
pub mod telemetry;
pub mod validation;

pub use error::{AppError, ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AppError, ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result};
    pub use crate::rbac::{
        define_ability_for, Ability, AbilityBuilder, Action, Condition, CurrentUser,
        EvaluationSettings, Membership, MissingAttribute, Organization, OrganizationId,
        PolicyEngine, PolicyError, RbacContext, ResourceInstance, ResourceType, Role,
        RoleCatalog, Rule, Subject, User, UserId,
    };
    pub use crate::store::{InMemoryStore, OrganizationDetails, OrganizationStore};
    pub use crate::validation::{
        validate_field, validate_request, FieldError, Validate, ValidationErrorKind,
        ValidationErrors, ValidationResult,
    };
}
