//! `coffer status`: vault, session, and keychain state.

use console::style;

use crate::cli::output;
use crate::cli::{data_dir, open_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::{CofferError, Result};

/// Execute the `status` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let dir = data_dir(cli)?;
    let vault = open_vault(cli)?;
    let status = vault.status()?;

    println!("{} {}", style("Data dir:").bold(), dir.root().display());

    if !status.initialized {
        output::info("Vault not initialized.");
        output::tip("Run `coffer init` to create one.");
        return Ok(());
    }

    match status.expires_at {
        Some(at) if status.unlocked => println!(
            "{} {} (until {})",
            style("Vault:").bold(),
            style("unlocked").green(),
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ),
        _ => println!("{} {}", style("Vault:").bold(), style("locked").red()),
    }

    let keychain = match (status.keychain_enabled, status.keychain_available) {
        (true, _) => style("enabled").green().to_string(),
        (false, true) => "disabled".to_string(),
        (false, false) => style("unavailable").dim().to_string(),
    };
    println!("{} {keychain}", style("Keychain:").bold());

    let project = match SecretEngine::new(&vault).active_project() {
        Ok(p) => p.name,
        Err(CofferError::NoActiveProject) => style("none").dim().to_string(),
        Err(e) => return Err(e),
    };
    println!("{} {project}", style("Project:").bold());

    Ok(())
}
