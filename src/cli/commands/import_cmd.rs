//! `coffer import`: load secrets from a `.env` or JSON file.
//!
//! The format comes from `--format`, else the `.json` extension, else
//! whether the content parses as a JSON object; anything else is `.env`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::cli::env_parser;
use crate::cli::output;
use crate::cli::{unlocked_vault, Cli};
use crate::engine::SecretEngine;
use crate::errors::{CofferError, Result};

/// Execute the `import` command.
pub fn execute(cli: &Cli, file_path: &str, env: &str, format: Option<&str>) -> Result<()> {
    let source = Path::new(file_path);
    let content = fs::read_to_string(source).map_err(|e| {
        CofferError::CommandFailed(format!("failed to read {}: {e}", source.display()))
    })?;

    let detected = match format {
        Some(f) => f.to_string(),
        None => detect_format(source, &content).to_string(),
    };

    let secrets = match detected.as_str() {
        "env" => env_parser::parse_env_str(&content),
        "json" => parse_json(&content)?,
        other => {
            return Err(CofferError::CommandFailed(format!(
                "unknown import format '{other}', use 'env' or 'json'"
            )));
        }
    };

    if secrets.is_empty() {
        output::warning("No secrets found in the import file.");
        return Ok(());
    }

    let vault = unlocked_vault(cli)?;
    let engine = SecretEngine::new(&vault);
    let target = engine.target(env)?;

    let entries: Vec<(String, String)> = secrets.into_iter().collect();
    let report = engine.import(&target, &entries)?;

    for key in &report.skipped {
        output::warning(&format!("Skipped '{key}': not a valid secret name"));
    }
    output::success(&format!(
        "Imported {} secrets into {}/{} ({} new, {} updated)",
        report.created + report.updated,
        target.project.name,
        target.environment.name,
        report.created,
        report.updated
    ));

    Ok(())
}

/// Pick `json` or `env` for a file without an explicit `--format`.
fn detect_format(path: &Path, content: &str) -> &'static str {
    let is_json_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json_ext || serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(content).is_ok() {
        "json"
    } else {
        "env"
    }
}

/// Parse a JSON object into a key-value map.
///
/// Non-string values are stored as their JSON text.
fn parse_json(content: &str) -> Result<BTreeMap<String, String>> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)
        .map_err(|e| CofferError::CommandFailed(format!("invalid JSON: {e}")))?;

    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}
