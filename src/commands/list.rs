//! `skill-bus list`: full subscription listing grouped by insert, with
//! two-layer condition display, scope annotations, overridden entries, and
//! orphan inserts.

use std::path::Path;

use serde_json::Value;

use crate::commands::utils::format_conditions;
use crate::config::{self, EffectiveView, Scope, Settings};

pub fn execute(_args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let mut warnings = Vec::new();
    let (global, project) = config::load_configs(cwd, &mut warnings);
    let view = config::merge(global.as_ref(), project.as_ref(), &mut warnings);

    let mut out = format_settings(&view.settings, global.as_ref(), project.as_ref());
    out.push_str("\n\n");
    out.push_str(&format_grouped(&view, global.as_ref(), project.as_ref()));
    for warning in &warnings {
        out.push('\n');
        out.push_str(warning);
    }
    Ok((out, 0))
}

fn scope_enabled(config: Option<&Value>) -> &'static str {
    match config {
        None => "no config",
        Some(value) => {
            let enabled = value
                .get("settings")
                .and_then(|s| s.get("enabled"))
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            if enabled { "enabled" } else { "disabled" }
        }
    }
}

fn format_settings(settings: &Settings, global: Option<&Value>, project: Option<&Value>) -> String {
    let mut lines = vec!["Skill Bus Status:".to_string()];
    lines.push(format!("  Global:  {}", scope_enabled(global)));
    lines.push(format!("  Project: {}", scope_enabled(project)));
    lines.push(format!(
        "  Max matches per skill: {}",
        settings.max_matches_per_skill
    ));
    lines.push(format!(
        "  Console echo: {}",
        if settings.show_console_echo { "on" } else { "off" }
    ));
    if settings.monitor_slash_commands {
        lines.push("  Slash command monitoring: ON".to_string());
    } else {
        lines.push(
            "  Slash command monitoring: off (enable with \"monitorSlashCommands\": true in settings)"
                .to_string(),
        );
    }
    lines.push(format!(
        "  Condition skip logging: {}",
        if settings.show_condition_skips { "on" } else { "off" }
    ));
    lines.join("\n")
}

/// Override directives declared in the project config: specific identity
/// tuples and broad insert names.
fn detect_overrides(project: Option<&Value>) -> (Vec<(String, String, String)>, Vec<String>) {
    let mut specific = Vec::new();
    let mut broad = Vec::new();
    let subs = project
        .and_then(|v| v.get("subscriptions"))
        .and_then(|v| v.as_array());
    if let Some(subs) = subs {
        for sub in subs {
            let obj = match sub.as_object() {
                Some(obj) => obj,
                None => continue,
            };
            if obj.get("enabled").and_then(|v| v.as_bool()) != Some(false) {
                continue;
            }
            let insert = match obj.get("insert").and_then(|v| v.as_str()) {
                Some(insert) => insert,
                None => continue,
            };
            if obj.contains_key("on") && obj.contains_key("when") {
                specific.push((
                    insert.to_string(),
                    obj.get("on").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    obj.get("when").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                ));
            } else {
                broad.push(insert.to_string());
            }
        }
    }
    (specific, broad)
}

/// Global subs that a project override disabled. They are absent from the
/// merged list but shown so the user sees the complete picture.
fn overridden_global_subs(
    global: Option<&Value>,
    specific: &[(String, String, String)],
    broad: &[String],
) -> Vec<(String, String, String)> {
    let mut overridden = Vec::new();
    let subs = global
        .and_then(|v| v.get("subscriptions"))
        .and_then(|v| v.as_array());
    if let Some(subs) = subs {
        for sub in subs {
            let obj = match sub.as_object() {
                Some(obj) => obj,
                None => continue,
            };
            let insert = obj.get("insert").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let on = obj.get("on").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let when = obj.get("when").and_then(|v| v.as_str()).unwrap_or("pre").to_string();
            if broad.contains(&insert) || specific.contains(&(insert.clone(), on.clone(), when.clone())) {
                overridden.push((insert, on, when));
            }
        }
    }
    overridden
}

fn format_grouped(view: &EffectiveView, global: Option<&Value>, project: Option<&Value>) -> String {
    let (specific, broad) = detect_overrides(project);
    let overridden = overridden_global_subs(global, &specific, &broad);

    // Group by insert name preserving first-seen order.
    let mut group_order: Vec<String> = Vec::new();
    for sub in &view.subscriptions {
        if !group_order.contains(&sub.insert) {
            group_order.push(sub.insert.clone());
        }
    }
    for (insert, _, _) in &overridden {
        if !group_order.contains(insert) {
            group_order.push(insert.clone());
        }
    }

    if group_order.is_empty() {
        return "Subscriptions: (none)".to_string();
    }

    let mut lines = vec!["Subscriptions (grouped by insert):".to_string()];
    for insert_name in &group_order {
        lines.push(String::new());
        lines.push(format!("  {}:", insert_name));

        let insert_conditions = view
            .inserts
            .get(insert_name)
            .map(|i| i.conditions.as_slice())
            .unwrap_or(&[]);
        if !insert_conditions.is_empty() {
            lines.push(format!(
                "    insert conditions: {}",
                format_conditions(insert_conditions)
            ));
        }

        for sub in view.subscriptions.iter().filter(|s| &s.insert == insert_name) {
            let scope = match sub.scope {
                Scope::Global => "global",
                Scope::Project => "project",
            };
            lines.push(format!("    -> {} [{}] ({})", sub.on, sub.when, scope));

            if !sub.inherit_conditions {
                lines.push(
                    "      inheritConditions: false (opts out of insert conditions)".to_string(),
                );
                if !sub.conditions.is_empty() {
                    lines.push(format!("      sub conditions: {}", format_conditions(&sub.conditions)));
                    lines.push(format!("      effective: {}", format_conditions(&sub.conditions)));
                } else {
                    lines.push("      effective: (none)".to_string());
                }
            } else if !insert_conditions.is_empty() {
                if !sub.conditions.is_empty() {
                    lines.push(format!("      sub conditions: {}", format_conditions(&sub.conditions)));
                    let mut effective = insert_conditions.to_vec();
                    effective.extend(sub.conditions.iter().cloned());
                    lines.push(format!("      effective: {}", format_conditions(&effective)));
                } else {
                    lines.push("      (no sub conditions)".to_string());
                    lines.push(format!("      effective: {}", format_conditions(insert_conditions)));
                }
            } else if !sub.conditions.is_empty() {
                lines.push(format!("      conditions: {}", format_conditions(&sub.conditions)));
            }
        }

        for (_, on, when) in overridden.iter().filter(|(i, _, _)| i == insert_name) {
            lines.push(format!("    -> {} [{}] (global, disabled in project)", on, when));
        }
    }

    let orphans: Vec<&String> = view
        .inserts
        .keys()
        .filter(|name| {
            !view.subscriptions.iter().any(|s| &s.insert == *name)
                && !overridden.iter().any(|(i, _, _)| i == *name)
        })
        .collect();
    if !orphans.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "  Orphan inserts (no subscriptions): {}",
            orphans.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }

    lines.join("\n")
}
