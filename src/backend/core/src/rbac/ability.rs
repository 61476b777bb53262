//! Abilities: ordered rule lists and their evaluation.
//!
//! An [`Ability`] answers "can this user perform action A on subject S?".
//! Rules are scanned in order and the **last** candidate match wins:
//!
//! - a rule is a candidate when its resource type is `all` or equals the
//!   subject's type, its actions include `manage` or the queried action, and
//!   its condition (if any) holds for a concrete instance
//! - a conditioned rule never matches a bare-type query
//! - a conditioned rule whose condition is false is skipped, so evaluation
//!   falls through to earlier rules
//! - no candidate means deny
//!
//! This is what makes "revoke broadly, then re-allow with a condition" work.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use super::condition::Condition;
use super::policy::{EvaluationSettings, PolicyError};
use super::schemas::ResourceInstance;
use super::subjects::{Action, ResourceType};
use crate::error::{AppError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a rule grants or revokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// The atomic unit of policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub effect: Effect,
    pub actions: Vec<Action>,
    pub resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Rule {
    pub fn matches_action(&self, action: Action) -> bool {
        self.actions
            .iter()
            .any(|a| *a == Action::Manage || *a == action)
    }

    pub fn matches_type(&self, resource_type: ResourceType) -> bool {
        self.resource_type.covers(resource_type)
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// True for deny rules.
    pub fn is_inverted(&self) -> bool {
        self.effect == Effect::Deny
    }

    fn is_candidate(
        &self,
        action: Action,
        subject: Subject<'_>,
        settings: &EvaluationSettings,
    ) -> std::result::Result<bool, PolicyError> {
        if !self.matches_type(subject.resource_type()) || !self.matches_action(action) {
            return Ok(false);
        }
        match (&self.condition, subject) {
            (None, _) => Ok(true),
            (Some(_), Subject::Type(_)) => Ok(false),
            (Some(condition), Subject::Instance(instance)) => {
                condition.evaluate(instance, settings.missing_attribute)
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.effect {
            Effect::Allow => "can",
            Effect::Deny => "cannot",
        };
        let actions: Vec<&str> = self.actions.iter().map(Action::as_str).collect();
        write!(f, "{} [{}] {}", verb, actions.join(", "), self.resource_type)?;
        if let Some(condition) = &self.condition {
            write!(f, " where {}", condition)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subject
// ═══════════════════════════════════════════════════════════════════════════════

/// What a query is about: a bare resource type or a concrete instance.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Type(ResourceType),
    Instance(&'a ResourceInstance),
}

impl Subject<'_> {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Type(t) => *t,
            Self::Instance(instance) => instance.resource_type(),
        }
    }
}

impl From<ResourceType> for Subject<'_> {
    fn from(resource_type: ResourceType) -> Self {
        Subject::Type(resource_type)
    }
}

impl<'a> From<&'a ResourceInstance> for Subject<'a> {
    fn from(instance: &'a ResourceInstance) -> Self {
        Subject::Instance(instance)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

/// Accumulates rules in call order.
#[derive(Debug, Default)]
pub struct AbilityBuilder {
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        effect: Effect,
        actions: impl IntoIterator<Item = Action>,
        resource_type: ResourceType,
        condition: Option<Condition>,
    ) -> &mut Self {
        self.rules.push(Rule {
            effect,
            actions: actions.into_iter().collect(),
            resource_type,
            condition,
        });
        self
    }

    /// Grant `actions` on every `resource_type`.
    pub fn can(
        &mut self,
        actions: impl IntoIterator<Item = Action>,
        resource_type: ResourceType,
    ) -> &mut Self {
        self.push(Effect::Allow, actions, resource_type, None)
    }

    /// Grant `actions` on instances satisfying `condition`.
    pub fn can_when(
        &mut self,
        actions: impl IntoIterator<Item = Action>,
        resource_type: ResourceType,
        condition: Condition,
    ) -> &mut Self {
        self.push(Effect::Allow, actions, resource_type, Some(condition))
    }

    /// Revoke `actions` on every `resource_type`.
    pub fn cannot(
        &mut self,
        actions: impl IntoIterator<Item = Action>,
        resource_type: ResourceType,
    ) -> &mut Self {
        self.push(Effect::Deny, actions, resource_type, None)
    }

    /// Revoke `actions` on instances satisfying `condition`.
    pub fn cannot_when(
        &mut self,
        actions: impl IntoIterator<Item = Action>,
        resource_type: ResourceType,
        condition: Condition,
    ) -> &mut Self {
        self.push(Effect::Deny, actions, resource_type, Some(condition))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn build(self, settings: EvaluationSettings) -> Ability {
        Ability {
            rules: self.rules.into(),
            settings,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ability
// ═══════════════════════════════════════════════════════════════════════════════

/// An immutable, ordered rule set for one (user, role) pair.
///
/// Cloning is cheap; evaluation never mutates.
#[derive(Debug, Clone)]
pub struct Ability {
    rules: Arc<[Rule]>,
    settings: EvaluationSettings,
}

impl Ability {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// The rule that decides the query, if any.
    ///
    /// Scans from the end and stops at the first candidate, which is the last
    /// candidate in sequence order. Rules earlier than the deciding one are
    /// never evaluated.
    pub fn relevant_rule_for<'s>(
        &self,
        action: Action,
        subject: impl Into<Subject<'s>>,
    ) -> std::result::Result<Option<&Rule>, PolicyError> {
        let subject = subject.into();
        for rule in self.rules.iter().rev() {
            if rule.is_candidate(action, subject, &self.settings)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    /// Decide a query, surfacing evaluation errors.
    pub fn check<'s>(
        &self,
        action: Action,
        subject: impl Into<Subject<'s>>,
    ) -> std::result::Result<bool, PolicyError> {
        let subject = subject.into();
        let rule = self.relevant_rule_for(action, subject)?;
        let allowed = rule.is_some_and(|r| r.effect == Effect::Allow);

        debug!(
            action = %action,
            resource_type = %subject.resource_type(),
            instance = matches!(subject, Subject::Instance(_)),
            allowed,
            rule = ?rule.map(ToString::to_string),
            "Ability evaluated"
        );

        Ok(allowed)
    }

    /// Decide a query. Evaluation errors are logged and deny.
    pub fn can<'s>(&self, action: Action, subject: impl Into<Subject<'s>>) -> bool {
        let subject = subject.into();
        match self.check(action, subject) {
            Ok(allowed) => allowed,
            Err(e) => {
                error!(
                    error = %e,
                    action = %action,
                    resource_type = %subject.resource_type(),
                    "Ability evaluation failed, denying"
                );
                false
            }
        }
    }

    /// Negation of [`Ability::can`].
    pub fn cannot<'s>(&self, action: Action, subject: impl Into<Subject<'s>>) -> bool {
        !self.can(action, subject)
    }

    /// Rules whose type and action match, ignoring conditions, in order.
    pub fn rules_for(
        &self,
        action: Action,
        resource_type: ResourceType,
    ) -> impl Iterator<Item = &Rule> + '_ {
        self.rules
            .iter()
            .filter(move |r| r.matches_type(resource_type) && r.matches_action(action))
    }

    /// Handler-boundary check: deny becomes `Forbidden`, an evaluation
    /// failure becomes an internal `EvaluationError`.
    pub fn enforce<'s>(
        &self,
        action: Action,
        subject: impl Into<Subject<'s>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Result<()> {
        let subject = subject.into();
        let resource_type = subject.resource_type();
        let outcome = self.check(action, subject);

        let decision = match &outcome {
            Ok(true) => "allow",
            Ok(false) => "deny",
            Err(_) => "error",
        };
        counter!(
            "saas_authorization_decisions_total",
            "action" => action.as_str(),
            "resource_type" => resource_type.as_str(),
            "decision" => decision,
        )
        .increment(1);

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::forbidden(message)
                .with_context("action", action)
                .with_context("resourceType", resource_type)),
            Err(e) => Err(AppError::from(e)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
