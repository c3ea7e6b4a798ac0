//! `skill-bus stats [--session ID] [--days N]`: telemetry summary with
//! hit rates, skip detail, coverage gaps, and follow-up suggestions.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::commands::utils::flag_value;
use crate::config;
use crate::telemetry;

fn of_kind<'a>(events: &'a [Value], kind: &str) -> Vec<&'a Value> {
    events
        .iter()
        .filter(|e| e.get("event").and_then(|v| v.as_str()) == Some(kind))
        .collect()
}

pub fn execute(args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let session = flag_value(args, "--session");
    let days = match flag_value(args, "--days") {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| format!("--days requires a number, got '{}'", raw))?,
        ),
        None => None,
    };

    let mut warnings = Vec::new();
    let (global, project) = config::load_configs(cwd, &mut warnings);
    let view = config::merge(global.as_ref(), project.as_ref(), &mut warnings);

    let events = telemetry::read_events(cwd, &view.settings, session, days);
    if events.is_empty() {
        let mut out = "No telemetry data found.".to_string();
        if !view.settings.telemetry {
            out.push_str("\n  Telemetry is disabled. Enable with: \"telemetry\": true in settings.");
        }
        return Ok((out, 0));
    }

    let matches = of_kind(&events, "match");
    let skips = of_kind(&events, "condition_skip");
    let no_match = of_kind(&events, "no_match");

    let mut lines = vec!["Skill Bus Stats".to_string(), "=".repeat(40)];
    if let Some(days) = days {
        lines.push(format!("(last {} days)", days));
    }
    lines.push(String::new());

    let matched_skills: std::collections::BTreeSet<&str> = matches
        .iter()
        .filter_map(|e| e.get("skill").and_then(|v| v.as_str()))
        .collect();
    lines.push(format!("Skills intercepted: {}", matched_skills.len()));
    lines.push(format!("Inserts injected: {}", matches.len()));
    lines.push(String::new());

    if !matches.is_empty() {
        lines.push("Top skills:".to_string());
        let mut by_skill: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for event in &matches {
            let skill = event.get("skill").and_then(|v| v.as_str()).unwrap_or("?");
            let insert = event.get("insert").and_then(|v| v.as_str()).unwrap_or("?");
            by_skill.entry(skill).or_default().push(insert);
        }
        let mut ranked: Vec<(&str, Vec<&str>)> = by_skill.into_iter().collect();
        ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        for (skill, inserts) in ranked {
            let total = inserts.len();
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for insert in &inserts {
                *counts.entry(insert).or_insert(0) += 1;
            }
            let parts: Vec<String> = counts
                .iter()
                .map(|(insert, count)| format!("{} {}/{}", insert, count, total))
                .collect();
            lines.push(format!("  {} - {}x ({})", skill, total, parts.join(", ")));
        }
        lines.push(String::new());
    }

    lines.push(format!("Condition skips: {}", skips.len()));
    if !skips.is_empty() {
        let mut by_pair: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for event in &skips {
            let insert = event.get("insert").and_then(|v| v.as_str()).unwrap_or("?");
            let skill = event.get("skill").and_then(|v| v.as_str()).unwrap_or("?");
            *by_pair.entry((insert, skill)).or_insert(0) += 1;
        }
        for ((insert, skill), count) in &by_pair {
            lines.push(format!("  {} on {} ({}x)", insert, skill, count));
        }
    }
    lines.push(String::new());

    lines.push(format!("No coverage: {}", no_match.len()));
    let mut gaps: BTreeMap<&str, usize> = BTreeMap::new();
    for event in &no_match {
        let skill = event.get("skill").and_then(|v| v.as_str()).unwrap_or("?");
        *gaps.entry(skill).or_insert(0) += 1;
    }
    if !gaps.is_empty() {
        let mut ranked: Vec<(&str, usize)> = gaps.iter().map(|(k, v)| (*k, *v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        for (skill, count) in &ranked {
            lines.push(format!("  {} - {}x", skill, count));
        }
    }
    lines.push(String::new());

    let sessions: std::collections::BTreeSet<&str> = events
        .iter()
        .filter_map(|e| e.get("sessionId").and_then(|v| v.as_str()))
        .collect();
    lines.push(format!("Sessions: {}", sessions.len()));

    let mut suggestions: Vec<String> = Vec::new();
    let mut ranked_gaps: Vec<(&str, usize)> = gaps.iter().map(|(k, v)| (*k, *v)).collect();
    ranked_gaps.sort_by(|a, b| b.1.cmp(&a.1));
    for (skill, count) in ranked_gaps {
        if count >= 3 {
            suggestions.push(format!(
                "  {} ran {}x with no subscription. Consider: skill-bus add-insert --on {}",
                skill, count, skill
            ));
        }
    }
    let mut skip_by_insert: BTreeMap<&str, usize> = BTreeMap::new();
    for event in &skips {
        let insert = event.get("insert").and_then(|v| v.as_str()).unwrap_or("?");
        *skip_by_insert.entry(insert).or_insert(0) += 1;
    }
    let mut ranked_skips: Vec<(&str, usize)> = skip_by_insert.into_iter().collect();
    ranked_skips.sort_by(|a, b| b.1.cmp(&a.1));
    for (insert, count) in ranked_skips {
        if count >= 3 {
            suggestions.push(format!(
                "  {} skipped {}x due to conditions. Run: skill-bus simulate <skill>",
                insert, count
            ));
        }
    }
    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("Suggestions:".to_string());
        lines.extend(suggestions);
    }

    Ok((lines.join("\n"), 0))
}
