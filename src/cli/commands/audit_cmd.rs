//! `coffer audit`: show recent vault operations.
//!
//! Usage:
//!   coffer audit               # show last 50 entries
//!   coffer audit --last 20     # show last 20

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::{AuditEntry, AuditLog};
use crate::cli::output;
use crate::cli::{unlocked_vault, Cli};
use crate::errors::Result;

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize) -> Result<()> {
    let vault = unlocked_vault(cli)?;
    let entries = AuditLog::new(vault.store()).query(last)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);
    Ok(())
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Action", "Project", "Environment", "Key", "Result", "Details"]);

    for entry in entries {
        let outcome = if entry.success {
            style("ok").green().to_string()
        } else {
            style("failed").red().to_string()
        };
        table.add_row(vec![
            entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            colorize_action(&entry.action),
            entry.project.clone().unwrap_or_else(|| "-".into()),
            entry.environment.clone().unwrap_or_else(|| "-".into()),
            entry.key_name.clone().unwrap_or_else(|| "-".into()),
            outcome,
            entry.details.clone().unwrap_or_else(|| "-".into()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize action names for display.
fn colorize_action(action: &str) -> String {
    match action {
        "create" => style(action).green().to_string(),
        "update" => style(action).blue().to_string(),
        "delete" => style(action).red().to_string(),
        "run" => style(action).yellow().to_string(),
        "export" | "import" => style(action).cyan().to_string(),
        _ => action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorize_action_keeps_the_name() {
        for action in ["create", "update", "delete", "read", "unknown"] {
            assert!(console::strip_ansi_codes(&colorize_action(action)).contains(action));
        }
    }
}
