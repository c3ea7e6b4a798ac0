//! Shared CLI helpers: flag parsing, condition rendering, and the
//! read-modify-write path with its malformed-file guard.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use crate::config;

/// Value of `--flag <value>` in an args slice, if present.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Working directory for a CLI invocation: `--cwd` override or the process
/// current dir.
pub fn cwd_from_args(args: &[String]) -> PathBuf {
    match flag_value(args, "--cwd") {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// First positional (non-flag) argument after the subcommand name.
pub fn first_positional<'a>(args: &'a [String], skip: usize) -> Option<&'a str> {
    let mut iter = args.iter().skip(skip).peekable();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            // Skip the flag's value too.
            iter.next();
            continue;
        }
        return Some(arg.as_str());
    }
    None
}

/// Config file path for a `--scope` value.
pub fn config_path_for_scope(scope: &str, cwd: &Path) -> Result<PathBuf, String> {
    match scope {
        "global" => Ok(config::global_config_path()),
        "project" => Ok(config::project_config_path(cwd)),
        other => Err(format!(
            "Invalid --scope '{}'. Use 'global' or 'project'.",
            other
        )),
    }
}

/// Load a config file for modification. A malformed file refuses the write
/// so a typo never destroys existing subscriptions; a missing file becomes
/// an empty skeleton.
pub fn load_for_write(path: &Path) -> Result<Value, String> {
    let mut warnings = Vec::new();
    match config::load_config(path, &mut warnings) {
        Some(value) => Ok(value),
        None if warnings.is_empty() => Ok(json!({"inserts": {}, "subscriptions": []})),
        None => {
            let mut message = warnings.join("\n");
            message.push_str("\nFix the JSON syntax before modifying config.");
            Err(message)
        }
    }
}

/// Write a config file with pretty indentation and a trailing newline.
pub fn write_config(path: &Path, value: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.is_dir() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Cannot create {}: {}", parent.display(), e))?;
        }
    }
    let mut content = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Cannot serialize config: {}", e))?;
    content.push('\n');
    fs::write(path, content).map_err(|e| format!("Cannot write {}: {}", path.display(), e))
}

/// Render a single condition record to a compact human-readable string.
pub fn format_condition(condition: &Value) -> String {
    let entry = condition
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next());
    let (kind, body) = match entry {
        Some(entry) => entry,
        None => return condition.to_string(),
    };
    match kind.as_str() {
        "not" => format!("not({})", format_condition(body)),
        "fileExists" => format!("fileExists({})", body),
        "gitBranch" => format!("gitBranch({})", body),
        "envSet" => format!("envSet({})", body),
        "envEquals" => match body.as_object() {
            Some(fields) => format!(
                "envEquals({}, {})",
                fields.get("var").and_then(|v| v.as_str()).unwrap_or("?"),
                fields.get("value").cloned().unwrap_or(json!("?"))
            ),
            None => format!("envEquals({})", body),
        },
        "fileContains" => match body.as_object() {
            Some(fields) => {
                let file = fields.get("file").and_then(|v| v.as_str()).unwrap_or("?");
                let pattern = fields.get("pattern").and_then(|v| v.as_str()).unwrap_or("?");
                if fields.get("regex").and_then(|v| v.as_bool()) == Some(true) {
                    format!("fileContains(\"{}\", /{}/)", file, pattern)
                } else {
                    format!("fileContains(\"{}\", \"{}\")", file, pattern)
                }
            }
            None => format!("fileContains({})", body),
        },
        other => format!("{}({})", other, body),
    }
}

/// Join multiple conditions with AND, or "(none)".
pub fn format_conditions(conditions: &[Value]) -> String {
    if conditions.is_empty() {
        return "(none)".to_string();
    }
    conditions
        .iter()
        .map(format_condition)
        .collect::<Vec<_>>()
        .join(" AND ")
}
