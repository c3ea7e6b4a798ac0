//! Pre-parse fast filter.
//!
//! The common case is "no subscription applies to this skill" and it must
//! answer in a few milliseconds. The checks here are byte-level scans over
//! the raw config files: substring and regex-lite only, never a JSON parse.
//! Any hit is over-approximate: it only means the full pipeline must run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{self, STATE_DIR};

/// Marker dropped after the one-time first-run nudge for a project.
pub const NUDGE_MARKER: &str = ".skill-bus-nudge";

/// Outcome of the fast gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Some config plausibly matches; run the full pipeline.
    Proceed,
    /// Nothing to do and nothing to say.
    RejectSilently,
    /// First time seeing this project with no configuration.
    EmitNudge(String),
    /// No coverage, but unmatched observation is switched on.
    LogNoCoverage,
}

fn wildcard_subscription_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""on"\s*:\s*"[^"]*\*"#).expect("static regex"))
}

/// Regex-lite check that a raw config switches a boolean setting on.
fn flag_enabled(raw: &str, name: &str) -> bool {
    match Regex::new(&format!(r#""{}"\s*:\s*true"#, name)) {
        Ok(re) => re.is_match(raw),
        Err(_) => false,
    }
}

/// A raw config plausibly covers a skill when the skill name appears
/// anywhere in the bytes, or when any subscription pattern carries a
/// wildcard (substring matching alone would miss those).
fn mentions_skill(raw: &str, skill: &str) -> bool {
    raw.contains(skill) || wildcard_subscription_re().is_match(raw)
}

fn read_raw(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

pub fn nudge_marker_path(cwd: &Path) -> PathBuf {
    cwd.join(STATE_DIR).join(NUDGE_MARKER)
}

/// Gate a tool event on cheap checks. Never parses JSON.
pub fn check(cwd: &Path, skill: &str) -> FilterDecision {
    let global_raw = read_raw(&config::global_config_path());
    let project_raw = read_raw(&config::project_config_path(cwd));

    if global_raw.is_none() && project_raw.is_none() {
        return first_run(cwd);
    }

    let raws = [global_raw.as_deref(), project_raw.as_deref()];
    if raws.into_iter().flatten().any(|raw| mentions_skill(raw, skill)) {
        return FilterDecision::Proceed;
    }

    let observe = raws
        .into_iter()
        .flatten()
        .any(|raw| flag_enabled(raw, "observeUnmatched"));
    let telemetry = raws
        .into_iter()
        .flatten()
        .any(|raw| flag_enabled(raw, "telemetry"));
    if observe && telemetry {
        FilterDecision::LogNoCoverage
    } else {
        FilterDecision::RejectSilently
    }
}

/// Fast gate for the prompt-monitor path: the setting is off by default, so
/// unless some raw config switches it on there is nothing to do.
pub fn prompt_monitor_enabled(cwd: &Path) -> bool {
    let global_raw = read_raw(&config::global_config_path());
    let project_raw = read_raw(&config::project_config_path(cwd));
    [global_raw.as_deref(), project_raw.as_deref()]
        .into_iter()
        .flatten()
        .any(|raw| flag_enabled(raw, "monitorSlashCommands"))
}

/// One-time nudge toward setup. Marker creation is best-effort; a failure
/// just means the nudge may repeat.
fn first_run(cwd: &Path) -> FilterDecision {
    let marker = nudge_marker_path(cwd);
    if marker.exists() {
        return FilterDecision::RejectSilently;
    }
    if let Some(parent) = marker.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = fs::write(&marker, "nudged\n");
    FilterDecision::EmitNudge(
        "[skill-bus] No skill-bus configuration found for this project. \
         Create .claude/skill-bus.json to start injecting context into skills. \
         (This notice appears once per project.)"
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG_FILE, GLOBAL_CONFIG_ENV};
    use std::env;
    use tempfile::TempDir;

    fn write_project_config(dir: &TempDir, content: &str) {
        let state = dir.path().join(STATE_DIR);
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join(CONFIG_FILE), content).unwrap();
    }

    fn isolate_global(dir: &TempDir) {
        // Point the global config at a path that does not exist.
        unsafe {
            env::set_var(
                GLOBAL_CONFIG_ENV,
                dir.path().join("no-global.json").to_string_lossy().as_ref(),
            )
        };
    }

    #[test]
    fn test_skill_name_substring_proceeds() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);
        write_project_config(
            &dir,
            r#"{"subscriptions": [{"insert": "x", "on": "tests:run", "when": "pre"}]}"#,
        );
        assert_eq!(check(dir.path(), "tests:run"), FilterDecision::Proceed);
    }

    #[test]
    fn test_wildcard_subscription_always_proceeds() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);
        write_project_config(
            &dir,
            r#"{"subscriptions": [{"insert": "x", "on": "tests:*", "when": "pre"}]}"#,
        );
        // "unrelated:skill" appears nowhere, but the wildcard pattern means
        // only the slow path can decide.
        assert_eq!(check(dir.path(), "unrelated:skill"), FilterDecision::Proceed);
    }

    #[test]
    fn test_no_coverage_rejects_silently_by_default() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);
        write_project_config(
            &dir,
            r#"{"subscriptions": [{"insert": "x", "on": "tests:run", "when": "pre"}]}"#,
        );
        assert_eq!(
            check(dir.path(), "deploy:ship"),
            FilterDecision::RejectSilently
        );
    }

    #[test]
    fn test_no_coverage_logs_when_observed() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);
        write_project_config(
            &dir,
            r#"{"settings": {"telemetry": true, "observeUnmatched": true},
                "subscriptions": [{"insert": "x", "on": "tests:run", "when": "pre"}]}"#,
        );
        assert_eq!(check(dir.path(), "deploy:ship"), FilterDecision::LogNoCoverage);
    }

    #[test]
    fn test_observe_without_telemetry_stays_silent() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);
        write_project_config(
            &dir,
            r#"{"settings": {"observeUnmatched": true},
                "subscriptions": [{"insert": "x", "on": "tests:run", "when": "pre"}]}"#,
        );
        assert_eq!(
            check(dir.path(), "deploy:ship"),
            FilterDecision::RejectSilently
        );
    }

    #[test]
    fn test_first_run_nudges_once() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);

        match check(dir.path(), "tests:run") {
            FilterDecision::EmitNudge(message) => {
                assert!(message.contains("No skill-bus configuration"));
            }
            other => panic!("expected nudge, got {:?}", other),
        }
        assert!(nudge_marker_path(dir.path()).exists());

        // Second invocation in the same project stays silent.
        assert_eq!(check(dir.path(), "tests:run"), FilterDecision::RejectSilently);
    }

    #[test]
    fn test_prompt_monitor_gate() {
        let _guard = crate::testutil::env_lock();
        let dir = TempDir::new().unwrap();
        isolate_global(&dir);
        assert!(!prompt_monitor_enabled(dir.path()));

        write_project_config(&dir, r#"{"settings": {"monitorSlashCommands": true}}"#);
        assert!(prompt_monitor_enabled(dir.path()));
    }

    #[test]
    fn test_flag_enabled_regex_lite() {
        assert!(flag_enabled(r#"{"telemetry": true}"#, "telemetry"));
        assert!(flag_enabled("\"telemetry\"  :  true", "telemetry"));
        assert!(!flag_enabled(r#"{"telemetry": false}"#, "telemetry"));
        assert!(!flag_enabled(r#"{"other": true}"#, "telemetry"));
    }

    #[test]
    fn test_mentions_skill() {
        let raw = r#"{"subscriptions": [{"insert": "x", "on": "plan:new", "when": "pre"}]}"#;
        assert!(mentions_skill(raw, "plan:new"));
        assert!(!mentions_skill(raw, "deploy:ship"));
        let wild = r#"{"subscriptions": [{"insert": "x", "on": "plan:*", "when": "pre"}]}"#;
        assert!(mentions_skill(wild, "deploy:ship"));
    }
}
