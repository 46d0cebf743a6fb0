//! `coffer init`: create the vault and start a session.

use crate::cli::output;
use crate::cli::{open_vault, prompt_new_password, Cli};
use crate::errors::{CofferError, Result};

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let vault = open_vault(cli)?;

    // Check before prompting so the user isn't asked for a password twice.
    if vault.is_initialized()? {
        output::tip("Run `coffer unlock` to start a session.");
        return Err(CofferError::AlreadyInitialized);
    }

    let password = prompt_new_password()?;
    vault.initialize(&password)?;

    output::success("Vault created and unlocked for 8 hours.");
    output::tip("Run `coffer project create <name>` to create your first project.");
    output::tip("Run `coffer keychain enable` to unlock without typing your password.");

    Ok(())
}
