//! `coffer unlock`: start an 8 hour session.
//!
//! With keychain unlock enabled the cached key is tried first and the
//! password prompt is the fallback.  `--keychain` never prompts;
//! `--prompt` never touches the keychain.

use crate::cli::output;
use crate::cli::{open_vault, prompt_password, Cli};
use crate::errors::{CofferError, Result};
use crate::vault::Vault;

/// Execute the `unlock` command.
pub fn execute(cli: &Cli, keychain_only: bool, prompt: bool) -> Result<()> {
    let vault = open_vault(cli)?;
    if !vault.is_initialized()? {
        return Err(CofferError::NotInitialized);
    }

    if keychain_only {
        vault.unlock_with_keychain()?;
        return report(&vault, "Vault unlocked from keychain");
    }

    if !prompt && vault.keychain_enabled()? {
        match vault.unlock_with_keychain() {
            Ok(()) => return report(&vault, "Vault unlocked from keychain"),
            Err(e) => {
                tracing::debug!(error = %e, "keychain unlock failed, falling back to password");
                output::warning(&format!("Keychain unlock failed ({e}); using password."));
            }
        }
    }

    let password = prompt_password()?;
    vault.unlock(&password)?;
    report(&vault, "Vault unlocked")
}

fn report(vault: &Vault, message: &str) -> Result<()> {
    match vault.status()?.expires_at {
        Some(at) => output::success(&format!(
            "{message} until {}",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        )),
        None => output::success(message),
    }
    Ok(())
}
