//! `skill-bus simulate <skill> [--timing T]`: dry-run matching with
//! per-condition pass/fail marks and short-circuit annotations.

use std::path::Path;

use serde_json::Value;

use crate::commands::utils::{first_positional, flag_value, format_condition};
use crate::conditions::{self, Environment};
use crate::config;
use crate::hooks::types::Timing;

pub fn execute(args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let skill = first_positional(args, 2)
        .ok_or("Usage: skill-bus simulate <skill> [--timing pre|post|complete] [--cwd <path>]")?;
    let timing = flag_value(args, "--timing").unwrap_or("pre");
    if Timing::from_str(timing).is_none() {
        return Err(format!(
            "Invalid --timing '{}'. Use 'pre', 'post', or 'complete'.",
            timing
        ));
    }

    let mut warnings = Vec::new();
    let (global, project) = config::load_configs(cwd, &mut warnings);
    let view = config::merge(global.as_ref(), project.as_ref(), &mut warnings);
    let env = Environment::new(cwd);

    let mut lines = vec![
        format!("Simulating: {} ({}) in {}", skill, timing, cwd.display()),
        String::new(),
    ];

    let mut matched_any = false;
    for sub in &view.subscriptions {
        if sub.when != timing || !conditions::glob_matches(&sub.on, skill) {
            continue;
        }
        matched_any = true;

        let insert_def = view.inserts.get(&sub.insert);
        let insert_conditions: &[Value] = insert_def.map(|i| i.conditions.as_slice()).unwrap_or(&[]);
        let opted_out = !sub.inherit_conditions;

        lines.push(format!("  {} -> {} [{}]:", sub.insert, sub.on, timing));
        let mut all_pass = true;

        if !insert_conditions.is_empty() && !opted_out {
            for cond in insert_conditions {
                let result = conditions::evaluate_value(cond, &env, &mut warnings);
                lines.push(format!(
                    "    insert: {} {}{}",
                    format_condition(cond),
                    mark(result),
                    live_annotation(cond, &env)
                ));
                if !result {
                    all_pass = false;
                    lines.push(
                        "    (short-circuit: insert condition failed, sub conditions not evaluated)"
                            .to_string(),
                    );
                    break;
                }
            }
        } else if opted_out && !insert_conditions.is_empty() {
            lines.push("    insert: (opted out with inheritConditions: false)".to_string());
        }

        if all_pass && !sub.conditions.is_empty() {
            for cond in &sub.conditions {
                let result = conditions::evaluate_value(cond, &env, &mut warnings);
                lines.push(format!(
                    "    sub: {} {}{}",
                    format_condition(cond),
                    mark(result),
                    live_annotation(cond, &env)
                ));
                if !result {
                    all_pass = false;
                    lines.push(
                        "    (short-circuit: sub condition failed, remaining not evaluated)"
                            .to_string(),
                    );
                    break;
                }
            }
        }

        if all_pass {
            let text_len = insert_def.map(|i| i.text.len()).unwrap_or(0);
            lines.push(format!("    -> fires (~{} tokens)", text_len / 4));
        } else {
            lines.push("    -> skipped (conditions not met)".to_string());
        }
        lines.push(String::new());
    }

    if !matched_any {
        lines.push(format!("  No subscriptions match '{}' [{}]", skill, timing));
    }
    for warning in &warnings {
        lines.push(warning.clone());
    }
    Ok((lines.join("\n"), 0))
}

fn mark(result: bool) -> &'static str {
    if result { "\u{2713}" } else { "\u{2717}" }
}

/// Extra live-value annotation for conditions whose environment state helps
/// explain the verdict.
fn live_annotation(cond: &Value, env: &Environment) -> String {
    let entry = cond
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next());
    let (kind, body) = match entry {
        Some(entry) => entry,
        None => return String::new(),
    };
    match kind.as_str() {
        "gitBranch" => match env.git_branch() {
            Some(branch) => format!(" (current: {})", branch),
            None => " (not in git repo)".to_string(),
        },
        "not" => live_annotation(body, env),
        _ => String::new(),
    }
}
