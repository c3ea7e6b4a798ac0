//! Dynamic insert resolution.
//!
//! Handlers form a small closed registry keyed by name. An insert naming a
//! handler gets its content computed at dispatch time; failures and empty
//! results fall back to the static text.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{Insert, Settings};
use crate::telemetry;

type Handler = fn(&Path, &Settings) -> Option<String>;

fn lookup(name: &str) -> Option<Handler> {
    match name {
        "session-stats" => Some(session_stats),
        _ => None,
    }
}

/// Produce the text to inject for a fired insert. Unknown handler names warn
/// and fall back immediately; handler misses fall back silently.
pub fn resolve_insert_text(
    insert: &Insert,
    cwd: &Path,
    settings: &Settings,
    warnings: &mut Vec<String>,
) -> String {
    let handler_name = match &insert.dynamic {
        Some(name) => name,
        None => return insert.text.clone(),
    };
    match lookup(handler_name) {
        Some(handler) => match handler(cwd, settings) {
            Some(text) if !text.is_empty() => text,
            _ => insert.text.clone(),
        },
        None => {
            warnings.push(format!(
                "[skill-bus] WARNING: unknown dynamic handler '{}', using static text",
                handler_name
            ));
            insert.text.clone()
        }
    }
}

/// Summarize the project's telemetry log: matched skills, insert injections,
/// condition-skip counts, and repeat no-coverage skills.
fn session_stats(cwd: &Path, settings: &Settings) -> Option<String> {
    let events = telemetry::read_events(cwd, settings, None, None);
    if events.is_empty() {
        return None;
    }

    let matches: Vec<_> = events
        .iter()
        .filter(|e| e.get("event").and_then(|v| v.as_str()) == Some("match"))
        .collect();
    let skips: Vec<_> = events
        .iter()
        .filter(|e| e.get("event").and_then(|v| v.as_str()) == Some("condition_skip"))
        .collect();
    let no_match: Vec<_> = events
        .iter()
        .filter(|e| e.get("event").and_then(|v| v.as_str()) == Some("no_match"))
        .collect();

    let matched_skills: std::collections::BTreeSet<&str> = matches
        .iter()
        .filter_map(|e| e.get("skill").and_then(|v| v.as_str()))
        .collect();

    let mut lines = vec!["[skill-bus session summary]".to_string()];
    lines.push(format!(
        "Skills intercepted: {} | Inserts injected: {}",
        matched_skills.len(),
        matches.len()
    ));

    if !skips.is_empty() {
        let mut by_insert: BTreeMap<&str, usize> = BTreeMap::new();
        for skip in &skips {
            let insert = skip.get("insert").and_then(|v| v.as_str()).unwrap_or("?");
            *by_insert.entry(insert).or_insert(0) += 1;
        }
        let parts: Vec<String> = by_insert
            .iter()
            .map(|(insert, count)| format!("{} ({}x)", insert, count))
            .collect();
        lines.push(format!("Condition skips: {}", parts.join(", ")));
    }

    if !no_match.is_empty() {
        let mut by_skill: BTreeMap<&str, usize> = BTreeMap::new();
        for event in &no_match {
            let skill = event.get("skill").and_then(|v| v.as_str()).unwrap_or("?");
            *by_skill.entry(skill).or_insert(0) += 1;
        }
        let mut gaps: Vec<(&str, usize)> =
            by_skill.into_iter().filter(|(_, count)| *count >= 3).collect();
        gaps.sort_by(|a, b| b.1.cmp(&a.1));
        if !gaps.is_empty() {
            lines.push("Gaps:".to_string());
            for (skill, count) in gaps {
                lines.push(format!("  {} ran {}x with no subscriptions", skill, count));
                lines.push(format!("  Suggestion: add a subscription for {}", skill));
            }
        }
    }

    Some(lines.join("\n"))
}
