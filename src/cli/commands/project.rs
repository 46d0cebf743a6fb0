//! `coffer project`: create, list, switch, and delete projects.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::cli::output;
use crate::cli::{confirm, unlocked_vault, Cli, ProjectAction};
use crate::engine::SecretEngine;
use crate::errors::Result;
use crate::store::ACTIVE_PROJECT_KEY;

/// Execute a `project` subcommand.
pub fn execute(cli: &Cli, action: &ProjectAction) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let store = vault.store();

    match action {
        ProjectAction::Create { name, description } => {
            let project = store.create_project(name, description.as_deref())?;
            engine.use_project(&project.name)?;
            output::success(&format!("Created project '{}' (now active)", project.name));
            output::tip("Run `coffer env create <name>` to add an environment.");
        }

        ProjectAction::List => {
            let projects = store.list_projects()?;
            if projects.is_empty() {
                output::info("No projects yet.");
                output::tip("Run `coffer project create <name>` to create one.");
                return Ok(());
            }

            let active = store.get_config(ACTIVE_PROJECT_KEY)?;
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Project", "Description", "Created", "Active"]);
            for p in &projects {
                let marker = if active.as_deref() == Some(p.name.as_str()) {
                    style("*").green().bold().to_string()
                } else {
                    String::new()
                };
                table.add_row(vec![
                    p.name.clone(),
                    p.description.clone().unwrap_or_default(),
                    p.created_at.format("%Y-%m-%d").to_string(),
                    marker,
                ]);
            }
            println!("{table}");
        }

        ProjectAction::Use { name } => {
            let project = engine.use_project(name)?;
            output::success(&format!("Switched to project '{}'", project.name));
        }

        ProjectAction::Delete { name, force } => {
            let project = store.get_project_by_name(name)?;
            confirm(
                *force,
                &format!(
                    "Delete project '{}' with all its environments and secrets?",
                    project.name
                ),
            )?;
            store.delete_project(&project.id)?;
            if store.get_config(ACTIVE_PROJECT_KEY)?.as_deref() == Some(project.name.as_str()) {
                store.delete_config(ACTIVE_PROJECT_KEY)?;
            }
            output::success(&format!("Deleted project '{}'", project.name));
        }
    }

    Ok(())
}
