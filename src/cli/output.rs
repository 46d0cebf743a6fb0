//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use std::collections::BTreeMap;

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::engine::HistoryEntry;
use crate::store::{ChangeKind, MergedSecret};

/// Longest value shown in a history table before truncation.
const MAX_SHOWN_VALUE: usize = 60;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print the secrets visible in an environment.
///
/// `values`, when given, adds a Value column.
pub fn print_secrets_table(secrets: &[MergedSecret], values: Option<&BTreeMap<String, String>>) {
    if secrets.is_empty() {
        info("No secrets in this environment yet.");
        tip("Run `coffer set <KEY> --env <env>` to add your first secret.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec!["Name", "Version", "Source", "Updated"];
    if values.is_some() {
        header.push("Value");
    }
    table.set_header(header);

    for m in secrets {
        let source = if m.inherited {
            format!("inherited from {}", m.source_env_name)
        } else {
            "local".to_string()
        };
        let mut row = vec![
            m.secret.key.clone(),
            format!("v{}", m.secret.version),
            source,
            m.secret.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        if let Some(values) = values {
            row.push(values.get(&m.secret.key).cloned().unwrap_or_default());
        }
        table.add_row(row);
    }

    println!("{table}");
}

/// Print a secret's history, newest first.
pub fn print_history_table(entries: &[HistoryEntry], show_values: bool) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec!["Version", "Change", "Time"];
    if show_values {
        header.push("Value");
    }
    table.set_header(header);

    for entry in entries {
        let change = match entry.record.change {
            ChangeKind::Create => style("+ create").green().to_string(),
            ChangeKind::Update => style("~ update").blue().to_string(),
            ChangeKind::Delete => style("- delete").red().to_string(),
        };
        let mut row = vec![
            format!("v{}", entry.record.version),
            change,
            entry.record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        if show_values {
            row.push(match (&entry.value, entry.record.change) {
                (_, ChangeKind::Delete) => "-".to_string(),
                (Some(v), _) => truncate(v, MAX_SHOWN_VALUE),
                (None, _) => "[decryption error]".to_string(),
            });
        }
        table.add_row(row);
    }

    println!("{table}");
}

/// Cut `value` to at most `max` characters, marking the cut with "...".
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_values() {
        assert_eq!(truncate("short", 60), "short");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        let long = "é".repeat(70);
        let cut = truncate(&long, 60);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 63);
    }
}
