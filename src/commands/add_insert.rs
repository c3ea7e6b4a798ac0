//! `skill-bus add-insert`: create or update an insert and append its
//! subscription in one write, through the same durability guard as `set`.

use std::path::Path;

use serde_json::{Value, json};

use crate::commands::utils::{config_path_for_scope, flag_value, load_for_write, write_config};
use crate::hooks::types::Timing;

pub fn execute(args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let usage = "Usage: skill-bus add-insert --name <name> [--text <text>] --on <pattern> \
                 [--when pre|post|complete] --scope global|project \
                 [--conditions <json>] [--dynamic <handler>]";

    let name = flag_value(args, "--name").ok_or(usage)?;
    let pattern = flag_value(args, "--on").ok_or(usage)?;
    let scope = flag_value(args, "--scope").ok_or(usage)?;
    let text = flag_value(args, "--text");
    let timing = flag_value(args, "--when").unwrap_or("pre");
    if Timing::from_str(timing).is_none() {
        return Err(format!(
            "Invalid --when '{}'. Use 'pre', 'post', or 'complete'.",
            timing
        ));
    }

    let path = config_path_for_scope(scope, cwd)?;
    let mut config = load_for_write(&path)?;

    if !config.get("inserts").map(|v| v.is_object()).unwrap_or(false) {
        config["inserts"] = json!({});
    }
    if !config.get("subscriptions").map(|v| v.is_array()).unwrap_or(false) {
        config["subscriptions"] = json!([]);
    }

    let existing = config["inserts"].get(name).cloned();
    let mut insert_def = match (text, existing) {
        // Reuse an existing insert untouched when no new text is given.
        (None, Some(existing)) => existing,
        (None, None) => {
            return Err(format!(
                "Error: --text is required when creating a new insert '{}'",
                name
            ));
        }
        // New text on an existing insert preserves its conditions/dynamic.
        (Some(text), Some(mut existing)) => {
            existing["text"] = json!(text);
            existing
        }
        (Some(text), None) => json!({"text": text}),
    };

    if let Some(conditions_json) = flag_value(args, "--conditions") {
        let conditions: Value = serde_json::from_str(conditions_json)
            .map_err(|e| format!("Invalid conditions JSON: {}", e))?;
        match conditions.as_array() {
            Some(list) if !list.is_empty() => insert_def["conditions"] = conditions,
            Some(_) => {}
            None => return Err("Invalid conditions JSON: expected an array".to_string()),
        }
    }
    if let Some(handler) = flag_value(args, "--dynamic") {
        insert_def["dynamic"] = json!(handler);
    }

    let is_duplicate = config["subscriptions"]
        .as_array()
        .map(|subs| {
            subs.iter().any(|s| {
                s.get("insert").and_then(|v| v.as_str()) == Some(name)
                    && s.get("on").and_then(|v| v.as_str()) == Some(pattern)
                    && s.get("when").and_then(|v| v.as_str()).unwrap_or("pre") == timing
            })
        })
        .unwrap_or(false);
    if is_duplicate {
        return Ok((
            format!("Subscription already exists: {} -> {} [{}]", name, pattern, timing),
            0,
        ));
    }

    config["inserts"][name] = insert_def;
    if let Some(subs) = config["subscriptions"].as_array_mut() {
        subs.push(json!({"insert": name, "on": pattern, "when": timing}));
    }

    write_config(&path, &config)?;
    Ok((
        format!("Created: {} -> {} [{}] ({})", name, pattern, timing, scope),
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG_FILE, STATE_DIR};
    use std::fs;
    use tempfile::TempDir;

    fn run(dir: &TempDir, argv: &[&str]) -> Result<(String, i32), String> {
        let args: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        execute(&args, dir.path())
    }

    fn read_config(dir: &TempDir) -> Value {
        let content = fs::read_to_string(dir.path().join(STATE_DIR).join(CONFIG_FILE)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn test_add_insert_creates_config() {
        let dir = TempDir::new().unwrap();
        let (out, code) = run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "CONTEXT",
                "--on", "tests:*", "--when", "pre", "--scope", "project",
            ],
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(out.contains("Created: ctx -> tests:* [pre] (project)"));

        let config = read_config(&dir);
        assert_eq!(config["inserts"]["ctx"]["text"], "CONTEXT");
        assert_eq!(config["subscriptions"][0]["insert"], "ctx");
        assert_eq!(config["subscriptions"][0]["on"], "tests:*");
        assert_eq!(config["subscriptions"][0]["when"], "pre");
    }

    #[test]
    fn test_add_insert_with_conditions_and_dynamic() {
        let dir = TempDir::new().unwrap();
        run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "stats", "--text", "fallback",
                "--on", "review:*", "--scope", "project",
                "--conditions", r#"[{"envSet": "CI"}]"#,
                "--dynamic", "session-stats",
            ],
        )
        .unwrap();
        let config = read_config(&dir);
        assert_eq!(config["inserts"]["stats"]["dynamic"], "session-stats");
        assert_eq!(config["inserts"]["stats"]["conditions"][0]["envSet"], "CI");
    }

    #[test]
    fn test_add_insert_duplicate_tuple_no_write() {
        let dir = TempDir::new().unwrap();
        run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "ONE",
                "--on", "tests:*", "--scope", "project",
            ],
        )
        .unwrap();
        let (out, code) = run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "TWO",
                "--on", "tests:*", "--scope", "project",
            ],
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(out.contains("Subscription already exists"));
        // The duplicate attempt did not overwrite the insert text.
        let config = read_config(&dir);
        assert_eq!(config["inserts"]["ctx"]["text"], "ONE");
        assert_eq!(config["subscriptions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_add_insert_reuses_existing_without_text() {
        let dir = TempDir::new().unwrap();
        run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "KEEP",
                "--on", "a:*", "--scope", "project",
            ],
        )
        .unwrap();
        let (out, _) = run(
            &dir,
            &["skill-bus", "add-insert", "--name", "ctx", "--on", "b:*", "--scope", "project"],
        )
        .unwrap();
        assert!(out.contains("Created: ctx -> b:* [pre]"));
        let config = read_config(&dir);
        assert_eq!(config["inserts"]["ctx"]["text"], "KEEP");
        assert_eq!(config["subscriptions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_add_insert_new_requires_text() {
        let dir = TempDir::new().unwrap();
        let err = run(
            &dir,
            &["skill-bus", "add-insert", "--name", "ghost", "--on", "a:*", "--scope", "project"],
        )
        .unwrap_err();
        assert!(err.contains("--text is required when creating a new insert 'ghost'"));
    }

    #[test]
    fn test_add_insert_updating_text_preserves_conditions() {
        let dir = TempDir::new().unwrap();
        run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "V1",
                "--on", "a:*", "--scope", "project",
                "--conditions", r#"[{"envSet": "CI"}]"#,
            ],
        )
        .unwrap();
        run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "V2",
                "--on", "b:*", "--scope", "project",
            ],
        )
        .unwrap();
        let config = read_config(&dir);
        assert_eq!(config["inserts"]["ctx"]["text"], "V2");
        assert_eq!(config["inserts"]["ctx"]["conditions"][0]["envSet"], "CI");
    }

    #[test]
    fn test_add_insert_refuses_malformed_file() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join(STATE_DIR);
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join(CONFIG_FILE), "][").unwrap();
        let err = run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "x", "--text", "T",
                "--on", "a:*", "--scope", "project",
            ],
        )
        .unwrap_err();
        assert!(err.contains("Fix the JSON syntax before modifying config."));
    }

    #[test]
    fn test_add_insert_rejects_bad_conditions_json() {
        let dir = TempDir::new().unwrap();
        let err = run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "x", "--text", "T",
                "--on", "a:*", "--scope", "project", "--conditions", "{not-an-array",
            ],
        )
        .unwrap_err();
        assert!(err.contains("Invalid conditions JSON"));
    }

    #[test]
    fn test_add_insert_then_dispatch_round_trip() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        unsafe {
            std::env::set_var(
                crate::config::GLOBAL_CONFIG_ENV,
                dir.path().join("no-global.json").to_string_lossy().as_ref(),
            )
        };
        run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "ctx", "--text", "INJECTED",
                "--on", "tests:*", "--scope", "project",
            ],
        )
        .unwrap();

        let stdin = serde_json::json!({
            "tool_name": "Skill",
            "tool_input": {"skill": "tests:run"},
            "cwd": dir.path().to_string_lossy(),
        })
        .to_string();
        let (stdout, code) = crate::hooks::dispatcher::dispatch(
            &crate::hooks::types::HookEvent::PreToolUse,
            &stdin,
        );
        assert_eq!(code, 0);
        let output: Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(output["hookSpecificOutput"]["additionalContext"], "INJECTED");
    }

    #[test]
    fn test_add_insert_rejects_bad_timing() {
        let dir = TempDir::new().unwrap();
        let err = run(
            &dir,
            &[
                "skill-bus", "add-insert", "--name", "x", "--text", "T",
                "--on", "a:*", "--when", "during", "--scope", "project",
            ],
        )
        .unwrap_err();
        assert!(err.contains("Invalid --when 'during'"));
    }
}
