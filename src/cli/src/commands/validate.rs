//! Catalog validation: `saas validate`.

use anyhow::Result;

use saas_core::rbac::PolicyEngine;

use crate::output;

pub fn execute(engine: &PolicyEngine) -> Result<()> {
    engine.validate_catalog()?;
    output::print_success(&format!(
        "Role catalog is valid ({} roles)",
        engine.catalog().roles().len()
    ));
    Ok(())
}
