//! The role catalog: one permission function per role.
//!
//! | Role    | Rules                                                                  |
//! |---------|------------------------------------------------------------------------|
//! | ADMIN   | manage all; update and transfer_ownership of an org only as its owner  |
//! | MEMBER  | get users; create and get projects; update and delete own projects     |
//! | BILLING | manage billing                                                         |
//!
//! Rule order inside each function is significant: later rules override
//! earlier ones when both match.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::ability::AbilityBuilder;
use super::condition::Condition;
use super::models::{Role, User};
use super::policy::PolicyError;
use super::subjects::{Action, ResourceType};

/// Appends a role's rules for `user` to the builder.
pub type PermissionsByRole = fn(&User, &mut AbilityBuilder);

// ═══════════════════════════════════════════════════════════════════════════════
// Standard Roles
// ═══════════════════════════════════════════════════════════════════════════════

fn admin(user: &User, builder: &mut AbilityBuilder) {
    builder
        .can([Action::Manage], ResourceType::All)
        .cannot(
            [Action::TransferOwnership, Action::Update],
            ResourceType::Organization,
        )
        .can_when(
            [Action::TransferOwnership, Action::Update],
            ResourceType::Organization,
            Condition::field("ownerId").eq(user.id.as_str()),
        );
}

fn member(user: &User, builder: &mut AbilityBuilder) {
    builder
        .can([Action::Get], ResourceType::User)
        .can([Action::Create, Action::Get], ResourceType::Project)
        .can_when(
            [Action::Update, Action::Delete],
            ResourceType::Project,
            Condition::field("ownerId").eq(user.id.as_str()),
        );
}

fn billing(_user: &User, builder: &mut AbilityBuilder) {
    builder.can([Action::Manage], ResourceType::Billing);
}

static STANDARD: LazyLock<RoleCatalog> = LazyLock::new(|| {
    let mut catalog = RoleCatalog::empty();
    catalog
        .register(Role::Admin, admin)
        .register(Role::Member, member)
        .register(Role::Billing, billing);
    catalog
});

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Maps each role to its permission function.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    entries: HashMap<Role, PermissionsByRole>,
}

impl RoleCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in ADMIN, MEMBER and BILLING catalog.
    pub fn standard() -> &'static RoleCatalog {
        &STANDARD
    }

    /// Register or replace a role's permission function.
    pub fn register(&mut self, role: Role, permissions: PermissionsByRole) -> &mut Self {
        self.entries.insert(role, permissions);
        self
    }

    pub fn get(&self, role: Role) -> Option<PermissionsByRole> {
        self.entries.get(&role).copied()
    }

    /// Registered roles in catalog order.
    pub fn roles(&self) -> Vec<Role> {
        Role::all()
            .into_iter()
            .filter(|r| self.entries.contains_key(r))
            .collect()
    }

    /// Check the catalog is usable before serving traffic.
    ///
    /// Every role must be registered and produce at least one rule, and
    /// every condition may only read attributes its resource type declares.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let sample = User::new("catalog-check");

        for role in Role::all() {
            let permissions = self.get(role).ok_or(PolicyError::RoleNotRegistered(role))?;

            let mut builder = AbilityBuilder::new();
            permissions(&sample, &mut builder);
            if builder.rules().is_empty() {
                return Err(PolicyError::EmptyRuleSet(role));
            }

            for rule in builder.rules() {
                let Some(condition) = &rule.condition else {
                    continue;
                };
                if let Some(field) = condition.fields().find(|f| !rule.resource_type.declares(f)) {
                    return Err(PolicyError::UndeclaredAttribute {
                        role,
                        resource_type: rule.resource_type,
                        attribute: field.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
