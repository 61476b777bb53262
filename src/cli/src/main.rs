//! SaaS CLI - Inspect and exercise the role catalog offline.
//!
//! Provides commands for listing roles, expanding a role into its rules,
//! checking single decisions and validating the catalog.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check, roles, validate};
use output::OutputFormat;
use saas_core::rbac::{EvaluationSettings, MissingAttribute, PolicyEngine};

/// Exit code for a denied `check`.
const EXIT_DENIED: i32 = 2;

/// SaaS - Role-based authorization CLI
#[derive(Parser)]
#[command(
    name = "saas",
    version,
    about = "SaaS - Role-based authorization",
    long_about = "CLI tool for inspecting roles, their rules and single authorization decisions.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Treat a condition on an attribute the subject lacks as unmet instead of an error
    #[arg(long, global = true)]
    lenient_attributes: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered roles
    Roles,

    /// Show the ordered rules a role grants a user
    Rules(roles::RulesArgs),

    /// Check whether a role may perform an action
    Check(check::CheckArgs),

    /// Validate the role catalog
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let missing_attribute = if cli.lenient_attributes {
        MissingAttribute::Fail
    } else {
        MissingAttribute::Reject
    };
    let engine = PolicyEngine::standard().with_settings(EvaluationSettings { missing_attribute });
    let format = cli.output;

    let result = match cli.command {
        Commands::Roles => roles::list_roles(&engine, format),
        Commands::Rules(args) => roles::list_rules(args, &engine, format),
        Commands::Check(args) => match check::execute(args, &engine, format) {
            Ok(true) => Ok(()),
            Ok(false) => std::process::exit(EXIT_DENIED),
            Err(e) => Err(e),
        },
        Commands::Validate => validate::execute(&engine),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
