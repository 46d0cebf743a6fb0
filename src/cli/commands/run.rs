//! `coffer run`: inject resolved secrets into a child process.

use std::process::Command;

use crate::cli::{unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::{CofferError, Result};

/// Execute the `run` command.
pub fn execute(cli: &Cli, env: &str, command: &[String]) -> Result<()> {
    let (program, args) = command.split_first().ok_or(CofferError::NoCommandSpecified)?;

    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    let secrets = engine.run_environment(&target, &command.join(" "))?;
    tracing::debug!(program = %program, count = secrets.len(), "spawning child");

    // The child inherits our environment; secrets override same-named vars.
    let status = Command::new(program)
        .args(args)
        .envs(&secrets)
        .status()
        .map_err(|e| CofferError::CommandFailed(format!("failed to start '{program}': {e}")))?;

    // Forward the child's exit code.
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(CofferError::ChildProcessFailed(code)),
        None => Err(CofferError::CommandFailed(
            "child process terminated by signal".into(),
        )),
    }
}
