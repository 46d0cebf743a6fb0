//! `coffer list`: show the secrets an environment sees.

use crate::cli::output;
use crate::cli::{unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli, env: &str, show_values: bool) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    let secrets = engine.list(&target)?;
    let values = if show_values {
        Some(engine.reveal_environment(&target)?)
    } else {
        None
    };

    let inherited = secrets.iter().filter(|s| s.inherited).count();
    output::info(&format!(
        "{}/{}: {} secret(s), {inherited} inherited",
        target.project.name,
        target.environment.name,
        secrets.len()
    ));
    output::print_secrets_table(&secrets, values.as_ref());

    Ok(())
}
