//! `coffer restore`: republish an earlier version as the live value.

use crate::cli::output;
use crate::cli::{unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::Result;

/// Execute the `restore` command.
pub fn execute(cli: &Cli, key: &str, env: &str, version: i64) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    let new_version = engine.restore(&target, key, version)?;
    output::success(&format!(
        "Restored '{key}' to the value of v{version} (now v{new_version})"
    ));

    Ok(())
}
