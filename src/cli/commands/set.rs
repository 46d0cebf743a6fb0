//! `coffer set`: add or update a secret in an environment.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{unlocked_vault, Cli};
use crate::engine::{SecretEngine, SetOutcome};
use crate::errors::{CofferError, Result};
use crate::resolver;

/// Execute the `set` command.
pub fn execute(cli: &Cli, key: &str, value: Option<&str>, env: &str, from_stdin: bool) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    // Determine the secret value from one of three sources.
    let secret_value = if let Some(v) = value {
        output::warning("Value provided on command line; it may appear in shell history.");
        Zeroizing::new(v.to_string())
    } else if from_stdin || !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
    } else {
        let entered = dialoguer::Password::new()
            .with_prompt(format!("Enter value for {key}"))
            .interact()
            .map_err(|e| CofferError::CommandFailed(format!("input prompt: {e}")))?;
        Zeroizing::new(entered)
    };

    match engine.set(&target, key, &secret_value)? {
        SetOutcome::Created => output::success(&format!(
            "Secret '{key}' added to {}/{} (v1)",
            target.project.name, target.environment.name
        )),
        SetOutcome::Updated { version } => output::success(&format!(
            "Secret '{key}' updated in {}/{} (v{version})",
            target.project.name, target.environment.name
        )),
    }

    let refs = resolver::references(&secret_value);
    if !refs.is_empty() {
        output::info(&format!("References: {}", refs.join(", ")));
    }

    Ok(())
}
