//! `coffer get`: print a single secret's value.

use crate::cli::{unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, key: &str, env: &str) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    // Raw value only, so the output can be piped.
    let secret = engine.get(&target, key)?;
    println!("{}", secret.value);

    Ok(())
}
