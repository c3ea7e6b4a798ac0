//! `skill-bus status`: quick one-liner.

use std::path::Path;

use crate::config::{self, Scope};

pub fn execute(_args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let mut warnings = Vec::new();
    let (global, project) = config::load_configs(cwd, &mut warnings);
    let view = config::merge(global.as_ref(), project.as_ref(), &mut warnings);

    let status = if view.settings.enabled { "enabled" } else { "PAUSED" };
    let g_count = view
        .subscriptions
        .iter()
        .filter(|s| s.scope == Scope::Global)
        .count();
    let p_count = view.subscriptions.len() - g_count;
    let monitor = if view.settings.monitor_slash_commands { "on" } else { "off" };

    let telemetry = if view.settings.telemetry {
        if view.settings.observe_unmatched {
            "on (+unmatched)".to_string()
        } else {
            "on".to_string()
        }
    } else {
        "off".to_string()
    };

    let mut out = [
        format!("Skill Bus v{}: {}", env!("CARGO_PKG_VERSION"), status),
        format!(
            "{} subs ({} global, {} project)",
            view.subscriptions.len(),
            g_count,
            p_count
        ),
        format!("{} inserts", view.inserts.len()),
        format!("prompt-monitor: {}", monitor),
        format!("telemetry: {}", telemetry),
    ]
    .join(" | ");

    for warning in &warnings {
        out.push('\n');
        out.push_str(warning);
    }
    Ok((out, 0))
}
