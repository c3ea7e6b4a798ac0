//! `skill-bus set <key> <value> --scope S`: typed settings writes through
//! the shared merge semantics. Refuses to touch a malformed config file.

use std::path::Path;

use serde_json::{Value, json};

use crate::commands::utils::{config_path_for_scope, flag_value, load_for_write, write_config};

const BOOLEAN_SETTINGS: &[&str] = &[
    "enabled",
    "showConsoleEcho",
    "disableGlobal",
    "monitorSlashCommands",
    "showConditionSkips",
    "telemetry",
    "observeUnmatched",
    "completionHooks",
];

/// (name, minimum)
const INTEGER_SETTINGS: &[(&str, i64)] = &[("maxMatchesPerSkill", 1), ("maxLogSizeKB", 0)];

const STRING_SETTINGS: &[&str] = &["telemetryPath"];

fn positionals(args: &[String], skip: usize) -> Vec<&str> {
    let mut found = Vec::new();
    let mut iter = args.iter().skip(skip).peekable();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
            continue;
        }
        found.push(arg.as_str());
    }
    found
}

fn parse_setting_value(key: &str, raw: &str) -> Result<Value, String> {
    if BOOLEAN_SETTINGS.contains(&key) {
        return match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(json!(true)),
            "false" | "0" | "no" | "off" => Ok(json!(false)),
            _ => Err(format!(
                "Boolean setting '{}' requires true/false, got '{}'",
                key, raw
            )),
        };
    }
    if let Some((_, minimum)) = INTEGER_SETTINGS.iter().find(|(name, _)| *name == key) {
        let value: i64 = raw.parse().map_err(|_| {
            format!("Integer setting '{}' requires a number, got '{}'", key, raw)
        })?;
        if value < *minimum {
            return Err(format!(
                "Integer setting '{}' must be >= {}, got {}",
                key, minimum, value
            ));
        }
        return Ok(json!(value));
    }
    if STRING_SETTINGS.contains(&key) {
        return Ok(json!(raw));
    }
    let mut valid: Vec<&str> = BOOLEAN_SETTINGS
        .iter()
        .chain(STRING_SETTINGS.iter())
        .copied()
        .chain(INTEGER_SETTINGS.iter().map(|(name, _)| *name))
        .collect();
    valid.sort_unstable();
    Err(format!(
        "Unknown setting: '{}'\nValid settings: {}",
        key,
        valid.join(", ")
    ))
}

pub fn execute(args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let positional = positionals(args, 2);
    let (key, raw_value) = match positional.as_slice() {
        [key, value, ..] => (*key, *value),
        _ => return Err("Usage: skill-bus set <key> <value> --scope global|project".to_string()),
    };
    let scope = flag_value(args, "--scope")
        .ok_or("Usage: skill-bus set <key> <value> --scope global|project")?;

    let value = parse_setting_value(key, raw_value)?;
    let path = config_path_for_scope(scope, cwd)?;
    let mut config = load_for_write(&path)?;

    if !config.get("settings").map(|s| s.is_object()).unwrap_or(false) {
        config["settings"] = json!({});
    }
    config["settings"][key] = value.clone();
    write_config(&path, &config)?;

    let mut out = format!("Set {} = {} in {} config", key, value, scope);
    if key == "observeUnmatched" && value == json!(true) {
        let telemetry_on = config["settings"]
            .get("telemetry")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !telemetry_on {
            out.push_str("\n  Note: observeUnmatched requires telemetry to be enabled");
        }
    }
    Ok((out, 0))
}
