//! `${NAME}` expansion over a flat, decrypted key/value mapping.
//!
//! A token is `${`, an uppercase letter, then uppercase letters, digits,
//! or underscores, then `}`.  Anything else (`$NAME`, `${lower}`) is
//! plain text.  Expansion is recursive; each key keeps its own path of
//! visited keys so cycles are reported instead of looping.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{CofferError, Result};

/// Maximum nesting of references followed from a single key.
pub const MAX_REFERENCE_DEPTH: usize = 10;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z][A-Z0-9_]*)\}").unwrap_or_else(|e| unreachable!("bad pattern: {e}"))
    })
}

/// Expand every value in `values`.  The result has the same key set.
pub fn resolve(values: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    values
        .keys()
        .map(|key| {
            let mut path = Vec::new();
            resolve_key(key, values, &mut path).map(|v| (key.clone(), v))
        })
        .collect()
}

fn resolve_key(key: &str, values: &BTreeMap<String, String>, path: &mut Vec<String>) -> Result<String> {
    if path.len() > MAX_REFERENCE_DEPTH || path.iter().any(|p| p == key) {
        let mut cycle = path.clone();
        cycle.push(key.to_string());
        return Err(CofferError::CircularReference {
            key: key.to_string(),
            path: cycle,
        });
    }

    let value = match values.get(key) {
        Some(v) => v,
        None => {
            return Err(CofferError::UnresolvedReference {
                key: path.last().cloned().unwrap_or_default(),
                reference: key.to_string(),
            })
        }
    };

    let pattern = token_pattern();
    if !pattern.is_match(value) {
        return Ok(value.clone());
    }

    path.push(key.to_string());
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for caps in pattern.captures_iter(value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !values.contains_key(name.as_str()) {
            return Err(CofferError::UnresolvedReference {
                key: key.to_string(),
                reference: name.as_str().to_string(),
            });
        }
        out.push_str(&value[last..whole.start()]);
        out.push_str(&resolve_key(name.as_str(), values, path)?);
        last = whole.end();
    }
    out.push_str(&value[last..]);
    path.pop();

    Ok(out)
}

/// Whether `value` contains at least one `${NAME}` token.
pub fn has_references(value: &str) -> bool {
    token_pattern().is_match(value)
}

/// Names referenced by `value`, in order of appearance.
pub fn references(value: &str) -> Vec<String> {
    token_pattern()
        .captures_iter(value)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
