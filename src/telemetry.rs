//! JSONL telemetry for stats and analysis.
//!
//! One record per line at `<cwd>/.claude/skill-bus-telemetry.jsonl`
//! (overridable via the telemetryPath setting). Writes are best-effort and
//! never propagate into dispatch. The reader tolerates partial last lines
//! and unknown event kinds.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, Utc};
use serde_json::{Map, Value, json};

use crate::config::{STATE_DIR, Settings, expand_tilde};

/// Default telemetry file name inside the project state directory.
pub const TELEMETRY_FILE: &str = "skill-bus-telemetry.jsonl";

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Stable per-process session identifier. Each dispatch is its own process,
/// so the pid groups all events of one invocation.
pub fn session_id() -> String {
    std::process::id().to_string()
}

/// Resolve the telemetry file path from settings or the default location.
pub fn resolve_telemetry_path(cwd: &Path, settings: &Settings) -> PathBuf {
    if !settings.telemetry_path.is_empty() {
        let path = expand_tilde(&settings.telemetry_path);
        if path.is_absolute() {
            return path;
        }
        return cwd.join(path);
    }
    cwd.join(STATE_DIR).join(TELEMETRY_FILE)
}

/// Append one event record. Silently succeeds or silently fails; telemetry
/// must never break dispatch. Callers gate on the telemetry setting.
pub fn log_event(event: &str, cwd: &Path, settings: &Settings, fields: &[(&str, Value)]) {
    let path = resolve_telemetry_path(cwd, settings);

    if let Some(parent) = path.parent() {
        if !parent.is_dir() && fs::create_dir_all(parent).is_err() {
            return;
        }
    }

    if settings.max_log_size_kb > 0 {
        maybe_rotate(&path, settings.max_log_size_kb as u64);
    }

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(Local::now().format(TS_FORMAT).to_string()));
    entry.insert("sessionId".to_string(), json!(session_id()));
    entry.insert("event".to_string(), json!(event));
    for (key, value) in fields {
        entry.insert(key.to_string(), value.clone());
    }

    let line = match serde_json::to_string(&Value::Object(entry)) {
        Ok(line) => line,
        Err(_) => return,
    };
    if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(&path) {
        let _ = f.write_all(format!("{}\n", line).as_bytes());
    }
}

/// Truncate the log to its newest half once it exceeds `max_size_kb`.
/// Not atomic; the threshold is kept high so concurrent rotations in one
/// project stay rare.
fn maybe_rotate(path: &Path, max_size_kb: u64) {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size <= max_size_kb * 1024 {
        return;
    }
    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return,
    };
    let lines: Vec<&str> = content.lines().collect();
    let keep = &lines[lines.len() / 2..];
    if keep.len() == lines.len() {
        // A single line exceeds the limit; halving is impossible.
        return;
    }
    let mut out = keep.join("\n");
    out.push('\n');
    let _ = fs::write(path, out);
}

/// Read and parse the telemetry log. Malformed lines (including a truncated
/// final line from a concurrent write) are skipped; unparseable timestamps
/// survive the day filter.
pub fn read_events(
    cwd: &Path,
    settings: &Settings,
    session_filter: Option<&str>,
    days_filter: Option<i64>,
) -> Vec<Value> {
    let path = resolve_telemetry_path(cwd, settings);
    let content = match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return Vec::new(),
    };

    let cutoff = days_filter.map(|days| Utc::now() - Duration::days(days));

    let mut events = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: Value = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if let Some(session) = session_filter {
            if entry.get("sessionId").and_then(|v| v.as_str()) != Some(session) {
                continue;
            }
        }
        if let Some(cutoff) = cutoff {
            let ts = entry.get("ts").and_then(|v| v.as_str()).unwrap_or("");
            if let Ok(parsed) = DateTime::parse_from_str(ts, TS_FORMAT) {
                if parsed.with_timezone(&Utc) < cutoff {
                    continue;
                }
            }
        }
        events.push(entry);
    }
    events
}
