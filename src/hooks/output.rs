//! Hook-response envelope construction.
//!
//! One JSON object on stdout: `hookSpecificOutput.additionalContext` carries
//! the injected text, `systemMessage` carries the echo and any accumulated
//! warnings. No content and no warnings means empty stdout so the host
//! treats the invocation as a pass-through.

use std::path::Path;

use serde_json::{Value, json};

use crate::config::{EffectiveView, Subscription};
use crate::dynamic;
use crate::hooks::types::Source;

/// Build the response for one dispatch. Returns None when there is nothing
/// at all to say.
pub fn build_response(
    matched: &[Subscription],
    envelope: &str,
    source: Source,
    view: &EffectiveView,
    cwd: &Path,
    completion_instruction: Option<&str>,
    warnings: &mut Vec<String>,
) -> Option<Value> {
    let mut context_parts: Vec<String> = Vec::new();
    let mut fired_inserts: Vec<String> = Vec::new();
    let mut seen_inserts: Vec<&str> = Vec::new();

    for sub in matched {
        if sub.insert.is_empty() {
            continue;
        }
        if seen_inserts.contains(&sub.insert.as_str()) {
            // Several subscriptions may reference one insert; emit its text once.
            continue;
        }
        seen_inserts.push(&sub.insert);
        match view.inserts.get(&sub.insert) {
            Some(insert) => {
                let text = dynamic::resolve_insert_text(insert, cwd, &view.settings, warnings);
                if !text.is_empty() {
                    context_parts.push(text);
                    fired_inserts.push(sub.insert.clone());
                }
            }
            None => {
                warnings.push(format!(
                    "[skill-bus] WARNING: dangling insert reference '{}' - skipping",
                    sub.insert
                ));
            }
        }
    }

    let mut combined = context_parts.join("\n\n");

    // Let the model know inserts were dropped at the ceiling.
    if let Some(note) = warnings.iter().find(|w| w.contains("maxMatchesPerSkill=")) {
        if !combined.is_empty() {
            combined.push_str(&format!("\n\n[Note: {}]", note));
        }
    }

    if let Some(instruction) = completion_instruction {
        if combined.is_empty() {
            combined = instruction.trim_start_matches('\n').to_string();
        } else {
            combined.push_str(instruction);
        }
    }

    let mut messages: Vec<String> = warnings.clone();
    if view.settings.show_console_echo && !fired_inserts.is_empty() {
        let label = match source {
            Source::Prompt => "[skill-bus] prompt-monitor:",
            Source::Tool => "[skill-bus]",
        };
        messages.push(format!(
            "{} {} sub(s) matched ({})",
            label,
            fired_inserts.len(),
            fired_inserts.join(", ")
        ));
    }

    if combined.is_empty() && messages.is_empty() {
        return None;
    }

    let mut result = json!({});
    if !combined.is_empty() {
        result["hookSpecificOutput"] = json!({
            "hookEventName": envelope,
            "additionalContext": combined,
        });
    }
    if !messages.is_empty() {
        result["systemMessage"] = json!(messages.join(" | "));
    }
    Some(result)
}
