//! Configuration loading and merging.
//!
//! Two files may exist: a global one (`~/.claude/skill-bus.json`, overridable
//! via `SKILL_BUS_GLOBAL_CONFIG`) and a project one
//! (`<cwd>/.claude/skill-bus.json`). Either, both, or neither is fine.
//! `merge` is a pure function from parsed values to the effective view so
//! tests can drive it with literal JSON.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Env var that redirects the global config path (used by tests).
pub const GLOBAL_CONFIG_ENV: &str = "SKILL_BUS_GLOBAL_CONFIG";

/// Config file name, identical in both scopes.
pub const CONFIG_FILE: &str = "skill-bus.json";

/// Hidden state directory name, relative to $HOME or the project root.
pub const STATE_DIR: &str = ".claude";

/// Operational knobs with typed defaults. Wrong-typed values in either
/// scope fall back to the default with a per-field warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub enabled: bool,
    pub max_matches_per_skill: i64,
    pub show_console_echo: bool,
    pub disable_global: bool,
    pub monitor_slash_commands: bool,
    pub completion_hooks: bool,
    pub show_condition_skips: bool,
    pub telemetry: bool,
    pub observe_unmatched: bool,
    pub telemetry_path: String,
    pub max_log_size_kb: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            max_matches_per_skill: 3,
            show_console_echo: true,
            disable_global: false,
            monitor_slash_commands: false,
            completion_hooks: false,
            show_condition_skips: false,
            telemetry: false,
            observe_unmatched: false,
            telemetry_path: String::new(),
            max_log_size_kb: 512,
        }
    }
}

impl Settings {
    /// Overlay one scope's `settings` object field-by-field. A wrong-typed
    /// value resets the field to its built-in default and warns.
    fn overlay(&mut self, settings: &Value, warnings: &mut Vec<String>) {
        let obj = match settings.as_object() {
            Some(obj) => obj,
            None => return,
        };
        let defaults = Settings::default();
        for (key, value) in obj {
            match key.as_str() {
                "enabled" => overlay_bool(key, value, &mut self.enabled, defaults.enabled, warnings),
                "maxMatchesPerSkill" => overlay_int(
                    key,
                    value,
                    &mut self.max_matches_per_skill,
                    defaults.max_matches_per_skill,
                    warnings,
                ),
                "showConsoleEcho" => overlay_bool(
                    key,
                    value,
                    &mut self.show_console_echo,
                    defaults.show_console_echo,
                    warnings,
                ),
                "disableGlobal" => overlay_bool(
                    key,
                    value,
                    &mut self.disable_global,
                    defaults.disable_global,
                    warnings,
                ),
                "monitorSlashCommands" => overlay_bool(
                    key,
                    value,
                    &mut self.monitor_slash_commands,
                    defaults.monitor_slash_commands,
                    warnings,
                ),
                "completionHooks" => overlay_bool(
                    key,
                    value,
                    &mut self.completion_hooks,
                    defaults.completion_hooks,
                    warnings,
                ),
                "showConditionSkips" => overlay_bool(
                    key,
                    value,
                    &mut self.show_condition_skips,
                    defaults.show_condition_skips,
                    warnings,
                ),
                "telemetry" => {
                    overlay_bool(key, value, &mut self.telemetry, defaults.telemetry, warnings)
                }
                "observeUnmatched" => overlay_bool(
                    key,
                    value,
                    &mut self.observe_unmatched,
                    defaults.observe_unmatched,
                    warnings,
                ),
                "telemetryPath" => match value.as_str() {
                    Some(s) => self.telemetry_path = s.to_string(),
                    None => {
                        warnings.push(format!(
                            "[skill-bus] WARNING: setting '{}' expects a string, got {} - using default",
                            key,
                            type_name(value)
                        ));
                        self.telemetry_path = defaults.telemetry_path.clone();
                    }
                },
                "maxLogSizeKB" => overlay_int(
                    key,
                    value,
                    &mut self.max_log_size_kb,
                    defaults.max_log_size_kb,
                    warnings,
                ),
                // Unknown settings are ignored forward-compatibly.
                _ => {}
            }
        }
    }
}

fn overlay_bool(key: &str, value: &Value, slot: &mut bool, default: bool, warnings: &mut Vec<String>) {
    match value.as_bool() {
        Some(b) => *slot = b,
        None => {
            warnings.push(format!(
                "[skill-bus] WARNING: setting '{}' expects a boolean, got {} - using default",
                key,
                type_name(value)
            ));
            *slot = default;
        }
    }
}

fn overlay_int(key: &str, value: &Value, slot: &mut i64, default: i64, warnings: &mut Vec<String>) {
    match value.as_i64() {
        Some(n) => *slot = n,
        None => {
            warnings.push(format!(
                "[skill-bus] WARNING: setting '{}' expects an integer, got {} - using default",
                key,
                type_name(value)
            ));
            *slot = default;
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A named, reusable unit of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub text: String,
    pub dynamic: Option<String>,
    pub conditions: Vec<Value>,
}

impl Insert {
    fn from_value(value: &Value) -> Option<Insert> {
        let obj = value.as_object()?;
        Some(Insert {
            text: obj
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            dynamic: obj
                .get("dynamic")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            conditions: obj
                .get("conditions")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// Which configuration file a subscription came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Project,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Project => "project",
        }
    }
}

/// A routing rule mapping a skill pattern and timing to an insert.
/// `when` stays a raw string so the matcher can warn on unknown timings.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub insert: String,
    pub on: String,
    pub when: String,
    pub inherit_conditions: bool,
    pub conditions: Vec<Value>,
    pub scope: Scope,
}

impl Subscription {
    fn from_value(value: &Value, scope: Scope) -> Option<Subscription> {
        let obj = value.as_object()?;
        Some(Subscription {
            insert: obj
                .get("insert")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            on: obj
                .get("on")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            when: obj
                .get("when")
                .and_then(|v| v.as_str())
                .unwrap_or("pre")
                .to_string(),
            inherit_conditions: obj
                .get("inheritConditions")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            conditions: obj
                .get("conditions")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
            scope,
        })
    }

    /// Identity tuple used for dedup and project-level overrides.
    pub fn identity(&self) -> (String, String, String) {
        (self.insert.clone(), self.on.clone(), self.when.clone())
    }
}

/// The merged, deduplicated, override-processed projection of both scopes.
#[derive(Debug, Clone)]
pub struct EffectiveView {
    pub settings: Settings,
    pub inserts: BTreeMap<String, Insert>,
    pub subscriptions: Vec<Subscription>,
}

/// Resolve the global config path, honoring the test override env var.
pub fn global_config_path() -> PathBuf {
    if let Ok(path) = env::var(GLOBAL_CONFIG_ENV) {
        return expand_tilde(&path);
    }
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(STATE_DIR).join(CONFIG_FILE),
        Err(_) => PathBuf::from(STATE_DIR).join(CONFIG_FILE),
    }
}

/// Project config path for a working directory.
pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(STATE_DIR).join(CONFIG_FILE)
}

/// Expand a leading `~` against $HOME.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home);
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load one config file. Missing files are not errors; malformed JSON (or a
/// non-object top level) warns and is treated as absent.
pub fn load_config(path: &Path, warnings: &mut Vec<String>) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return None,
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            warnings.push(format!(
                "[skill-bus] WARNING - {} has invalid JSON (top level must be an object). Fix to restore subscriptions.",
                path.display()
            ));
            None
        }
        Err(e) => {
            warnings.push(format!(
                "[skill-bus] WARNING - {} has invalid JSON ({}). Fix to restore subscriptions.",
                path.display(),
                e
            ));
            None
        }
    }
}

/// Load both scopes for a working directory.
pub fn load_configs(cwd: &Path, warnings: &mut Vec<String>) -> (Option<Value>, Option<Value>) {
    let global = load_config(&global_config_path(), warnings);
    let project = load_config(&project_config_path(cwd), warnings);
    (global, project)
}

/// Merge global and project configs into one effective view.
///
/// Settings cascade defaults -> global -> project. Inserts union with the
/// project fully replacing a colliding name. Subscriptions concatenate
/// global-then-project, then project override directives and identity-tuple
/// dedup (last occurrence wins) are applied. When the master gate is off the
/// effective subscription list is empty.
pub fn merge(
    global: Option<&Value>,
    project: Option<&Value>,
    warnings: &mut Vec<String>,
) -> EffectiveView {
    let mut settings = Settings::default();
    if let Some(g) = global.and_then(|v| v.get("settings")) {
        settings.overlay(g, warnings);
    }
    if let Some(p) = project.and_then(|v| v.get("settings")) {
        settings.overlay(p, warnings);
    }

    let inserts = merge_inserts(global, project, warnings);

    if !settings.enabled {
        return EffectiveView {
            settings,
            inserts,
            subscriptions: Vec::new(),
        };
    }

    let subscriptions = merge_subscriptions(global, project, &settings, warnings);

    EffectiveView {
        settings,
        inserts,
        subscriptions,
    }
}

fn merge_inserts(
    global: Option<&Value>,
    project: Option<&Value>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, Insert> {
    let mut merged = BTreeMap::new();
    for (scope_value, is_project) in [(global, false), (project, true)] {
        let obj = match scope_value
            .and_then(|v| v.get("inserts"))
            .and_then(|v| v.as_object())
        {
            Some(obj) => obj,
            None => continue,
        };
        for (name, def) in obj {
            match Insert::from_value(def) {
                Some(insert) => {
                    if is_project && merged.contains_key(name) {
                        warnings.push(format!(
                            "[skill-bus] INFO: insert '{}' defined in both scopes - using project version",
                            name
                        ));
                    }
                    merged.insert(name.clone(), insert);
                }
                None => {
                    warnings.push(format!(
                        "[skill-bus] WARNING: insert '{}' is not an object - skipping",
                        name
                    ));
                }
            }
        }
    }
    merged
}

fn raw_subscriptions<'a>(config: Option<&'a Value>) -> &'a [Value] {
    config
        .and_then(|v| v.get("subscriptions"))
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn merge_subscriptions(
    global: Option<&Value>,
    project: Option<&Value>,
    settings: &Settings,
    warnings: &mut Vec<String>,
) -> Vec<Subscription> {
    // Project override directives: enabled=false with a complete tuple
    // disables the matching global entry; with only an insert name it
    // disables every global subscription for that insert.
    let mut overrides_specific: Vec<(String, String, String)> = Vec::new();
    let mut overrides_insert: Vec<String> = Vec::new();
    let mut active_project: Vec<Subscription> = Vec::new();

    for raw in raw_subscriptions(project) {
        let obj = match raw.as_object() {
            Some(obj) => obj,
            None => continue,
        };
        if obj.get("enabled").and_then(|v| v.as_bool()) == Some(false) {
            if let Some(insert) = obj.get("insert").and_then(|v| v.as_str()) {
                if obj.contains_key("on") && obj.contains_key("when") {
                    overrides_specific.push((
                        insert.to_string(),
                        obj.get("on").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                        obj.get("when").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    ));
                } else {
                    overrides_insert.push(insert.to_string());
                }
            }
            // A self-disabled subscription without an insert is dropped silently.
            continue;
        }
        if let Some(sub) = parse_active_subscription(raw, Scope::Project, warnings) {
            active_project.push(sub);
        }
    }

    let mut filtered_global: Vec<Subscription> = Vec::new();
    if !settings.disable_global {
        for raw in raw_subscriptions(global) {
            let obj = match raw.as_object() {
                Some(obj) => obj,
                None => continue,
            };
            if obj.get("enabled").and_then(|v| v.as_bool()) == Some(false) {
                continue;
            }
            let sub = match parse_active_subscription(raw, Scope::Global, warnings) {
                Some(sub) => sub,
                None => continue,
            };
            if overrides_insert.contains(&sub.insert) {
                continue;
            }
            if overrides_specific.contains(&sub.identity()) {
                continue;
            }
            filtered_global.push(sub);
        }
    }

    let all: Vec<Subscription> = filtered_global.into_iter().chain(active_project).collect();
    dedup_by_identity(all, warnings)
}

/// Parse one active subscription, skipping the legacy inline-inject shape.
fn parse_active_subscription(
    raw: &Value,
    scope: Scope,
    warnings: &mut Vec<String>,
) -> Option<Subscription> {
    let obj = raw.as_object()?;
    if obj.contains_key("inject") && !obj.contains_key("insert") {
        warnings.push(
            "[skill-bus] ERROR: subscription uses old 'inject' format - skipped. \
             Migrate: extract inject text into an insert, replace 'inject' with 'insert' reference."
                .to_string(),
        );
        return None;
    }
    Subscription::from_value(raw, scope)
}

/// Deduplicate by identity tuple keeping the last occurrence (project wins),
/// at the last occurrence's position.
fn dedup_by_identity(all: Vec<Subscription>, warnings: &mut Vec<String>) -> Vec<Subscription> {
    let mut seen: Vec<((String, String, String), Scope)> = Vec::new();
    let mut deduped: Vec<Subscription> = Vec::new();
    for sub in all.into_iter().rev() {
        let key = sub.identity();
        match seen.iter().find(|(k, _)| *k == key) {
            None => {
                seen.push((key, sub.scope));
                deduped.push(sub);
            }
            Some((_, winner_scope)) => {
                if *winner_scope == sub.scope {
                    warnings.push(format!(
                        "[skill-bus] WARNING: duplicate subscription ({} -> {} [{}]) in {} scope - deduplicating",
                        key.0,
                        key.1,
                        key.2,
                        sub.scope.as_str()
                    ));
                } else {
                    warnings.push(format!(
                        "[skill-bus] WARNING: duplicate subscription ({} -> {} [{}]) - using {} version",
                        key.0,
                        key.1,
                        key.2,
                        winner_scope.as_str()
                    ));
                }
            }
        }
    }
    deduped.reverse();
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merged(global: Option<Value>, project: Option<Value>) -> (EffectiveView, Vec<String>) {
        let mut warnings = Vec::new();
        let view = merge(global.as_ref(), project.as_ref(), &mut warnings);
        (view, warnings)
    }

    #[test]
    fn test_defaults_when_no_configs() {
        let (view, warnings) = merged(None, None);
        assert!(view.settings.enabled);
        assert_eq!(view.settings.max_matches_per_skill, 3);
        assert!(view.subscriptions.is_empty());
        assert!(view.inserts.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_settings_cascade_project_over_global() {
        let global = json!({"settings": {"maxMatchesPerSkill": 5, "telemetry": true}});
        let project = json!({"settings": {"maxMatchesPerSkill": 2}});
        let (view, warnings) = merged(Some(global), Some(project));
        assert_eq!(view.settings.max_matches_per_skill, 2);
        assert!(view.settings.telemetry);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_wrong_typed_setting_falls_back_to_default() {
        let project = json!({"settings": {"maxMatchesPerSkill": "lots", "showConsoleEcho": 1}});
        let (view, warnings) = merged(None, Some(project));
        assert_eq!(view.settings.max_matches_per_skill, 3);
        assert!(view.settings.show_console_echo);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("maxMatchesPerSkill") || warnings[1].contains("maxMatchesPerSkill"));
    }

    #[test]
    fn test_wrong_typed_project_setting_resets_global_value() {
        let global = json!({"settings": {"maxMatchesPerSkill": 7}});
        let project = json!({"settings": {"maxMatchesPerSkill": true}});
        let (view, warnings) = merged(Some(global), Some(project));
        assert_eq!(view.settings.max_matches_per_skill, 3);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_master_gate_off_empties_subscriptions() {
        let project = json!({
            "settings": {"enabled": false},
            "inserts": {"x": {"text": "X"}},
            "subscriptions": [{"insert": "x", "on": "*", "when": "pre"}]
        });
        let (view, _) = merged(None, Some(project));
        assert!(!view.settings.enabled);
        assert!(view.subscriptions.is_empty());
    }

    #[test]
    fn test_insert_collision_project_wins_with_advisory() {
        let global = json!({"inserts": {"x": {"text": "GLOBAL"}}});
        let project = json!({"inserts": {"x": {"text": "PROJECT"}}});
        let (view, warnings) = merged(Some(global), Some(project));
        assert_eq!(view.inserts["x"].text, "PROJECT");
        assert!(warnings.iter().any(|w| w.contains("both scopes")));
    }

    #[test]
    fn test_non_object_insert_skipped_with_warning() {
        let project = json!({"inserts": {"x": "just a string"}});
        let (view, warnings) = merged(None, Some(project));
        assert!(view.inserts.is_empty());
        assert!(warnings.iter().any(|w| w.contains("not an object")));
    }

    #[test]
    fn test_subscription_dedup_project_wins() {
        let global = json!({"subscriptions": [
            {"insert": "x", "on": "foo:*", "when": "pre", "conditions": [{"envSet": "G"}]}
        ]});
        let project = json!({"subscriptions": [
            {"insert": "x", "on": "foo:*", "when": "pre", "conditions": [{"envSet": "P"}]}
        ]});
        let (view, warnings) = merged(Some(global), Some(project));
        assert_eq!(view.subscriptions.len(), 1);
        assert_eq!(view.subscriptions[0].scope, Scope::Project);
        assert_eq!(view.subscriptions[0].conditions[0]["envSet"], "P");
        assert!(warnings.iter().any(|w| w.contains("using project version")));
    }

    #[test]
    fn test_same_scope_duplicate_warns_and_keeps_last() {
        let project = json!({"subscriptions": [
            {"insert": "x", "on": "a:*", "when": "pre"},
            {"insert": "x", "on": "a:*", "when": "pre"}
        ]});
        let (view, warnings) = merged(None, Some(project));
        assert_eq!(view.subscriptions.len(), 1);
        assert!(warnings.iter().any(|w| w.contains("deduplicating")));
    }

    #[test]
    fn test_specific_override_removes_global_tuple() {
        let global = json!({
            "inserts": {"g": {"text": "G"}},
            "subscriptions": [{"insert": "g", "on": "foo:*", "when": "pre"}]
        });
        let project = json!({"subscriptions": [
            {"insert": "g", "on": "foo:*", "when": "pre", "enabled": false}
        ]});
        let (view, _) = merged(Some(global), Some(project));
        assert!(view.subscriptions.is_empty());
    }

    #[test]
    fn test_broad_override_removes_all_for_insert() {
        let global = json!({"subscriptions": [
            {"insert": "g", "on": "foo:*", "when": "pre"},
            {"insert": "g", "on": "bar:*", "when": "post"},
            {"insert": "h", "on": "foo:*", "when": "pre"}
        ]});
        let project = json!({"subscriptions": [{"insert": "g", "enabled": false}]});
        let (view, _) = merged(Some(global), Some(project));
        assert_eq!(view.subscriptions.len(), 1);
        assert_eq!(view.subscriptions[0].insert, "h");
    }

    #[test]
    fn test_disable_global_discards_global_subs_keeps_inserts() {
        let global = json!({
            "inserts": {"g": {"text": "G"}},
            "subscriptions": [{"insert": "g", "on": "*", "when": "pre"}]
        });
        let project = json!({
            "settings": {"disableGlobal": true},
            "subscriptions": [{"insert": "g", "on": "x:*", "when": "pre"}]
        });
        let (view, _) = merged(Some(global), Some(project));
        assert_eq!(view.subscriptions.len(), 1);
        assert_eq!(view.subscriptions[0].scope, Scope::Project);
        assert!(view.inserts.contains_key("g"));
    }

    #[test]
    fn test_global_self_disabled_sub_is_inert() {
        let global = json!({"subscriptions": [
            {"insert": "g", "on": "*", "when": "pre", "enabled": false}
        ]});
        let (view, warnings) = merged(Some(global), None);
        assert!(view.subscriptions.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_legacy_inject_shape_skipped_with_warning() {
        let project = json!({"subscriptions": [
            {"inject": "inline text", "on": "*", "when": "pre"}
        ]});
        let (view, warnings) = merged(None, Some(project));
        assert!(view.subscriptions.is_empty());
        assert!(warnings.iter().any(|w| w.contains("old 'inject' format")));
    }

    #[test]
    fn test_order_preserved_global_then_project() {
        let global = json!({"subscriptions": [
            {"insert": "a", "on": "*", "when": "pre"},
            {"insert": "b", "on": "*", "when": "pre"}
        ]});
        let project = json!({"subscriptions": [
            {"insert": "c", "on": "*", "when": "pre"}
        ]});
        let (view, _) = merged(Some(global), Some(project));
        let names: Vec<&str> = view.subscriptions.iter().map(|s| s.insert.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedup_keeps_last_occurrence_position() {
        let global = json!({"subscriptions": [
            {"insert": "a", "on": "*", "when": "pre"},
            {"insert": "b", "on": "*", "when": "pre"}
        ]});
        let project = json!({"subscriptions": [
            {"insert": "a", "on": "*", "when": "pre"}
        ]});
        let (view, _) = merged(Some(global), Some(project));
        let names: Vec<&str> = view.subscriptions.iter().map(|s| s.insert.as_str()).collect();
        // The surviving "a" is the project one, at the project position.
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(view.subscriptions[1].scope, Scope::Project);
    }

    #[test]
    fn test_subscription_defaults() {
        let project = json!({"subscriptions": [{"insert": "x", "on": "foo:*"}]});
        let (view, _) = merged(None, Some(project));
        let sub = &view.subscriptions[0];
        assert_eq!(sub.when, "pre");
        assert!(sub.inherit_conditions);
        assert!(sub.conditions.is_empty());
    }

    #[test]
    fn test_unknown_top_level_keys_ignored() {
        let project = json!({
            "futureFeature": {"x": 1},
            "subscriptions": [{"insert": "x", "on": "*"}]
        });
        let (view, warnings) = merged(None, Some(project));
        assert_eq!(view.subscriptions.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut warnings = Vec::new();
        let result = load_config(&dir.path().join("nope.json"), &mut warnings);
        assert!(result.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_config_malformed_json_warns() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{not json").unwrap();
        let mut warnings = Vec::new();
        let result = load_config(&path, &mut warnings);
        assert!(result.is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("invalid JSON"));
    }

    #[test]
    fn test_load_config_non_object_top_level() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[1, 2, 3]").unwrap();
        let mut warnings = Vec::new();
        let result = load_config(&path, &mut warnings);
        assert!(result.is_none());
        assert!(warnings[0].contains("top level must be an object"));
    }

    #[test]
    fn test_malformed_global_does_not_block_project() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = dir.path().join(STATE_DIR);
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(
            project_dir.join(CONFIG_FILE),
            r#"{"subscriptions": [{"insert": "x", "on": "*"}]}"#,
        )
        .unwrap();
        let mut warnings = Vec::new();
        let project = load_config(&project_config_path(dir.path()), &mut warnings);
        assert!(project.is_some());
        let (view, _) = {
            let mut w = Vec::new();
            (merge(None, project.as_ref(), &mut w), w)
        };
        assert_eq!(view.subscriptions.len(), 1);
    }

    #[test]
    fn test_expand_tilde() {
        let _guard = crate::testutil::env_lock();
        let saved_home = env::var("HOME");
        unsafe { env::set_var("HOME", "/home/tester") };
        assert_eq!(
            expand_tilde("~/x/y.json"),
            PathBuf::from("/home/tester/x/y.json")
        );
        assert_eq!(expand_tilde("/abs/p.json"), PathBuf::from("/abs/p.json"));
        assert_eq!(expand_tilde("rel.json"), PathBuf::from("rel.json"));
        match saved_home {
            Ok(home) => unsafe { env::set_var("HOME", home) },
            Err(_) => unsafe { env::remove_var("HOME") },
        }
    }
}
