//! `coffer export`: write an environment's secrets as `.env` or JSON.
//!
//! Supported formats:
//! - `env` (default): `KEY=value`, one per line, sorted by key
//! - `json`: a JSON object `{ "KEY": "value", ... }`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::{CofferError, Result};
use crate::resolver;

/// Execute the `export` command.
pub fn execute(
    cli: &Cli,
    env: &str,
    format: &str,
    expand_refs: bool,
    output_path: Option<&str>,
) -> Result<()> {
    // Reject an unknown format before anything is decrypted.
    if !matches!(format, "env" | "json") {
        return Err(CofferError::CommandFailed(format!(
            "unknown export format '{format}', use 'env' or 'json'"
        )));
    }

    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    let secrets = engine.export(&target, expand_refs)?;

    let content = if format == "json" {
        format_as_json(&secrets)?
    } else {
        format_as_env(&secrets)
    };

    match output_path {
        Some(dest) => {
            let dest_path = Path::new(dest);
            if dest_path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("db")) {
                return Err(CofferError::CommandFailed(
                    "refusing to export over a database file".into(),
                ));
            }

            fs::write(dest_path, &content).map_err(|e| {
                CofferError::CommandFailed(format!("failed to write export file: {e}"))
            })?;

            output::success(&format!(
                "Exported {} secrets from {}/{} to {dest} (format: {format})",
                secrets.len(),
                target.project.name,
                target.environment.name
            ));
            if !expand_refs && secrets.values().any(|v| resolver::has_references(v)) {
                output::tip("Some values contain ${...} references; pass --resolve to expand them.");
            }
        }
        None => {
            // Raw output only, so it can be redirected.
            print!("{content}");
        }
    }

    Ok(())
}

/// Format secrets as `.env` file content.
pub fn format_as_env(secrets: &BTreeMap<String, String>) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for (key, value) in secrets {
        if needs_quoting(value) {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n")
                .replace('\t', "\\t");
            let _ = writeln!(out, "{key}=\"{escaped}\"");
        } else {
            let _ = writeln!(out, "{key}={value}");
        }
    }
    out
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ' ' | '"' | '\'' | '\n' | '\t' | '$' | '`' | '#'))
}

/// Format secrets as a JSON object.
pub fn format_as_json(secrets: &BTreeMap<String, String>) -> Result<String> {
    let mut json = serde_json::to_string_pretty(secrets)
        .map_err(|e| CofferError::Serialization(format!("JSON export: {e}")))?;
    json.push('\n');
    Ok(json)
}
