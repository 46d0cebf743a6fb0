//! `coffer env`: manage the environments of the active project.

use comfy_table::{ContentArrangement, Table};

use crate::cli::output;
use crate::cli::{confirm, unlocked_vault, Cli, EnvAction};
use crate::engine::SecretEngine;
use crate::errors::Result;

/// Execute an `env` subcommand.
pub fn execute(cli: &Cli, action: &EnvAction) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let store = vault.store();
    let project = engine.active_project()?;

    match action {
        EnvAction::Create { name } => {
            let env = store.create_environment(&project.id, name, None)?;
            output::success(&format!(
                "Created environment '{}' in project '{}'",
                env.name, project.name
            ));
        }

        EnvAction::Branch { parent, name } => {
            let parent = engine.target(parent)?.environment;
            let env = store.create_environment(&project.id, name, Some(&parent.id))?;
            output::success(&format!(
                "Created environment '{}' inheriting from '{}'",
                env.name, parent.name
            ));
        }

        EnvAction::List => {
            let envs = store.list_environments(&project.id)?;
            if envs.is_empty() {
                output::info(&format!("No environments in project '{}'.", project.name));
                output::tip("Run `coffer env create <name>` to create one.");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Environment", "Inherits from", "Secrets", "Created"]);
            for env in &envs {
                let parent = match &env.parent_id {
                    Some(id) => envs
                        .iter()
                        .find(|e| &e.id == id)
                        .map(|e| e.name.clone())
                        .unwrap_or_else(|| "?".to_string()),
                    None => "-".to_string(),
                };
                let count = store.list_secrets(&env.id)?.len();
                table.add_row(vec![
                    env.name.clone(),
                    parent,
                    count.to_string(),
                    env.created_at.format("%Y-%m-%d").to_string(),
                ]);
            }

            output::info(&format!(
                "{} environment(s) in project '{}':",
                envs.len(),
                project.name
            ));
            println!("{table}");
        }

        EnvAction::Delete { name, force } => {
            let env = engine.target(name)?.environment;
            confirm(
                *force,
                &format!("Delete environment '{}' and all its secrets?", env.name),
            )?;
            store.delete_environment(&env.id)?;
            output::success(&format!("Deleted environment '{}'", env.name));
        }
    }

    Ok(())
}
