//! `coffer history`: list the versions of a secret, newest first.

use crate::cli::output;
use crate::cli::{load_settings, unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::{CofferError, Result};

/// Execute the `history` command.
pub fn execute(cli: &Cli, key: &str, env: &str, limit: Option<usize>, show_values: bool) -> Result<()> {
    let limit = match limit {
        Some(n) => n,
        None => load_settings(cli)?.history_limit,
    };

    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    let entries = engine.history(&target, key, limit, show_values)?;
    if entries.is_empty() {
        return Err(CofferError::NotFound(format!(
            "history for '{key}' in '{}'",
            target.environment.name
        )));
    }

    output::info(&format!(
        "History of '{key}' in {}/{}:",
        target.project.name, target.environment.name
    ));
    output::print_history_table(&entries, show_values);

    Ok(())
}
