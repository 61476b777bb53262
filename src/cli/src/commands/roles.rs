//! Role catalog inspection: `saas roles` and `saas rules`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use saas_core::rbac::{PolicyEngine, Role};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RulesArgs {
    /// Role to expand
    #[arg(short, long)]
    role: Role,

    /// User the rules are built for; conditions reference this id
    #[arg(short, long, default_value = "user")]
    user: String,
}

#[derive(Tabled, Serialize)]
struct RoleRow {
    #[tabled(rename = "Role")]
    role: Role,
    #[tabled(rename = "Rules")]
    rules: usize,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled, Serialize)]
struct RuleRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Rule")]
    rule: String,
}

pub fn list_roles(engine: &PolicyEngine, format: OutputFormat) -> Result<()> {
    let mut rows = Vec::new();
    for role in engine.catalog().roles() {
        let ability = engine.user_permissions("catalog", role)?;
        rows.push(RoleRow {
            role,
            rules: ability.len(),
            description: role.description().to_string(),
        });
    }
    output::print_list(&rows, format)
}

pub fn list_rules(args: RulesArgs, engine: &PolicyEngine, format: OutputFormat) -> Result<()> {
    let ability = engine.user_permissions(args.user.as_str(), args.role)?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<RuleRow> = ability
                .rules()
                .iter()
                .enumerate()
                .map(|(i, rule)| RuleRow {
                    position: i + 1,
                    rule: rule.to_string(),
                })
                .collect();
            output::print_header(&format!("{} rules for user {}", args.role, args.user));
            output::print_list(&rows, format)
        }
        _ => output::print_item(&ability.rules(), format),
    }
}
