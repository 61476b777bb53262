//! Single authorization decision: `saas check`.
//!
//! Without `--attrs` the subject is the bare type, which answers "may the
//! role do this to some instance". With `--attrs` the JSON object is
//! validated against the type's schema and checked as an instance.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use saas_core::rbac::{
    parse_subject, Action, PolicyEngine, ResourceInstance, ResourceType, Role, Subject,
};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Role held in the organization
    #[arg(short, long)]
    role: Role,

    /// Acting user id
    #[arg(short, long, default_value = "user")]
    user: String,

    /// Action to check (e.g. update, transfer_ownership)
    action: Action,

    /// Resource type (e.g. Organization, Project)
    subject: ResourceType,

    /// Instance attributes as a JSON object, e.g. '{"id":"1","ownerId":"123"}'
    #[arg(long)]
    attrs: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Decision {
    allowed: bool,
    role: Role,
    user: String,
    action: Action,
    subject: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<String>,
}

/// Returns whether the action was allowed.
pub fn execute(args: CheckArgs, engine: &PolicyEngine, format: OutputFormat) -> Result<bool> {
    let ability = engine.user_permissions(args.user.as_str(), args.role)?;

    let instance: Option<ResourceInstance> = match &args.attrs {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("--attrs must be a JSON object")?;
            Some(parse_subject(args.subject, &value)?)
        }
        None => None,
    };
    let subject = match &instance {
        Some(instance) => Subject::from(instance),
        None => Subject::from(args.subject),
    };

    let allowed = ability.check(args.action, subject)?;
    let rule = ability
        .relevant_rule_for(args.action, subject)?
        .map(ToString::to_string);

    let decision = Decision {
        allowed,
        role: args.role,
        user: args.user,
        action: args.action,
        subject: args.subject,
        rule,
    };

    match format {
        OutputFormat::Table => {
            let summary = format!(
                "{} as {} may {} {}",
                decision.user, decision.role, decision.action, decision.subject
            );
            if allowed {
                output::print_success(&summary);
            } else {
                output::print_denied(&format!("{} (not allowed)", summary));
            }
            output::print_detail(
                "Decided by",
                decision.rule.as_deref().unwrap_or("no matching rule"),
            );
        }
        _ => output::print_item(&decision, format)?,
    }

    Ok(allowed)
}
