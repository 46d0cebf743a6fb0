//! `coffer lock`: forget the session key.

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;

/// Execute the `lock` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let vault = open_vault(cli)?;
    vault.lock()?;
    output::success("Vault locked.");
    Ok(())
}
