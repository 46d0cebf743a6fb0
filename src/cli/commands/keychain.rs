//! `coffer keychain`: cache the vault key in the OS keychain.

use console::style;

use crate::cli::output;
use crate::cli::{open_vault, prompt_password, Cli, KeychainAction};
use crate::errors::{CofferError, Result};

/// Execute a `keychain` subcommand.
pub fn execute(cli: &Cli, action: &KeychainAction) -> Result<()> {
    let vault = open_vault(cli)?;
    if !vault.is_initialized()? {
        return Err(CofferError::NotInitialized);
    }

    match action {
        KeychainAction::Enable => {
            if !vault.keychain_available() {
                return Err(CofferError::KeychainUnavailable(
                    "no OS keychain could be reached".into(),
                ));
            }
            let password = prompt_password()?;
            vault.enable_keychain(&password)?;
            output::success("Keychain unlock enabled.");
            output::tip("`coffer unlock` will now use the keychain first.");
        }

        KeychainAction::Disable => {
            vault.disable_keychain()?;
            output::success("Keychain unlock disabled.");
        }

        KeychainAction::Status => {
            let available = if vault.keychain_available() {
                style("yes").green().to_string()
            } else {
                style("no").red().to_string()
            };
            let enabled = if vault.keychain_enabled()? {
                style("yes").green().to_string()
            } else {
                "no".to_string()
            };
            println!("{} {available}", style("Available:").bold());
            println!("{} {enabled}", style("Enabled:").bold());
        }
    }

    Ok(())
}
