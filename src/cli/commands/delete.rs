//! `coffer delete`: remove a secret from an environment.

use crate::cli::output;
use crate::cli::{confirm, unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::Result;

/// Execute the `delete` command.
pub fn execute(cli: &Cli, key: &str, env: &str, force: bool) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    confirm(
        force,
        &format!("Delete secret '{key}' from '{}'?", target.environment.name),
    )?;

    engine.delete(&target, key)?;
    output::success(&format!(
        "Deleted secret '{key}' from {}/{}",
        target.project.name, target.environment.name
    ));
    output::tip(&format!("Run `coffer history {key} --env {env}` to see earlier versions."));

    Ok(())
}
