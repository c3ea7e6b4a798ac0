//! Condition evaluation against the current environment.
//!
//! The vocabulary is closed: fileExists, gitBranch, envSet, envEquals,
//! fileContains, and not. The evaluator is total: any malformed condition
//! or probe failure becomes `false`, with a warning where the failure likely
//! indicates user error.

use std::cell::OnceCell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use glob::Pattern;
use serde_json::Value;

use crate::config::expand_tilde;

/// Files larger than this are never scanned by fileContains.
const MAX_FILE_CONTAINS_BYTES: u64 = 1_000_000;

/// Regex patterns longer than this are rejected to bound compilation cost.
const MAX_REGEX_PATTERN_LEN: usize = 500;

/// Dispatch-scoped view of the environment conditions probe. The git branch
/// is detected at most once per dispatch.
pub struct Environment {
    cwd: PathBuf,
    git_branch: OnceCell<Option<String>>,
}

impl Environment {
    pub fn new(cwd: &Path) -> Environment {
        Environment {
            cwd: cwd.to_path_buf(),
            git_branch: OnceCell::new(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Current git branch, or None outside a repository.
    pub fn git_branch(&self) -> Option<&str> {
        self.git_branch
            .get_or_init(|| detect_git_branch(&self.cwd))
            .as_deref()
    }
}

fn detect_git_branch(cwd: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["branch", "--show-current"])
        .current_dir(cwd)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch.is_empty() { None } else { Some(branch) }
}

/// The closed condition vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    FileExists(String),
    GitBranch(String),
    EnvSet(String),
    EnvEquals { var: String, value: String },
    FileContains { file: String, pattern: String, regex: bool },
    Not(Box<Condition>),
}

impl Condition {
    /// Parse a condition record. Structural problems return Err with the
    /// warning text; advisories (double negation) go straight to `warnings`.
    pub fn parse(value: &Value, warnings: &mut Vec<String>) -> Result<Condition, String> {
        let entry = value
            .as_object()
            .filter(|obj| obj.len() == 1)
            .and_then(|obj| obj.iter().next());
        let (kind, body) = match entry {
            Some(entry) => entry,
            None => {
                return Err(format!(
                    "[skill-bus] WARNING: malformed condition {}, treating as false",
                    value
                ));
            }
        };

        match kind.as_str() {
            "not" => {
                if !body.is_object() {
                    return Err(format!(
                        "[skill-bus] WARNING: 'not' condition must wrap a condition object, got {}",
                        json_type(body)
                    ));
                }
                if body.get("not").is_some() {
                    warnings.push(
                        "[skill-bus] WARNING: double negation in condition - likely a mistake"
                            .to_string(),
                    );
                }
                let inner = Condition::parse(body, warnings)?;
                Ok(Condition::Not(Box::new(inner)))
            }
            "fileExists" => match body.as_str() {
                Some(path) => Ok(Condition::FileExists(path.to_string())),
                None => Err(format!(
                    "[skill-bus] WARNING: fileExists requires a path string, got {}",
                    json_type(body)
                )),
            },
            "gitBranch" => match body.as_str() {
                Some(pattern) => Ok(Condition::GitBranch(pattern.to_string())),
                None => Err(format!(
                    "[skill-bus] WARNING: gitBranch requires a glob string, got {}",
                    json_type(body)
                )),
            },
            "envSet" => match body.as_str() {
                Some(var) => Ok(Condition::EnvSet(var.to_string())),
                None => Err(format!(
                    "[skill-bus] WARNING: envSet requires a variable name, got {}",
                    json_type(body)
                )),
            },
            "envEquals" => {
                let obj = body.as_object().ok_or_else(|| {
                    format!(
                        "[skill-bus] WARNING: envEquals requires {{\"var\": ..., \"value\": ...}}, got {}",
                        json_type(body)
                    )
                })?;
                let var = obj
                    .get("var")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .ok_or("[skill-bus] WARNING: envEquals missing 'var' field".to_string())?;
                let expected = obj
                    .get("value")
                    .ok_or("[skill-bus] WARNING: envEquals missing 'value' field".to_string())?;
                let expected = expected.as_str().ok_or_else(|| {
                    format!(
                        "[skill-bus] WARNING: envEquals 'value' must be a string, got {}. Use \"3000\" not 3000.",
                        json_type(expected)
                    )
                })?;
                Ok(Condition::EnvEquals {
                    var: var.to_string(),
                    value: expected.to_string(),
                })
            }
            "fileContains" => {
                let obj = body.as_object().ok_or_else(|| {
                    format!(
                        "[skill-bus] WARNING: fileContains requires {{\"file\": ..., \"pattern\": ...}}, got {}",
                        json_type(body)
                    )
                })?;
                let file = obj.get("file").and_then(|v| v.as_str()).unwrap_or("");
                let pattern = obj.get("pattern").and_then(|v| v.as_str()).unwrap_or("");
                if file.is_empty() || pattern.is_empty() {
                    return Err(
                        "[skill-bus] WARNING: fileContains missing 'file' or 'pattern' field"
                            .to_string(),
                    );
                }
                Ok(Condition::FileContains {
                    file: file.to_string(),
                    pattern: pattern.to_string(),
                    regex: obj.get("regex").and_then(|v| v.as_bool()) == Some(true),
                })
            }
            other => Err(format!(
                "[skill-bus] WARNING: unknown condition type '{}', treating as false",
                other
            )),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolve a condition path: expand `~`, then join relative paths onto cwd.
fn resolve_path(path: &str, cwd: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

/// Evaluate a raw condition record. Never raises; malformed input is false
/// with a warning.
pub fn evaluate_value(value: &Value, env: &Environment, warnings: &mut Vec<String>) -> bool {
    match Condition::parse(value, warnings) {
        Ok(cond) => evaluate(&cond, env, warnings),
        Err(warning) => {
            warnings.push(warning);
            false
        }
    }
}

/// Evaluate a parsed condition against the environment.
pub fn evaluate(cond: &Condition, env: &Environment, warnings: &mut Vec<String>) -> bool {
    match cond {
        Condition::Not(inner) => !evaluate(inner, env, warnings),
        Condition::FileExists(path) => resolve_path(path, env.cwd()).exists(),
        Condition::GitBranch(pattern) => match env.git_branch() {
            Some(branch) => glob_matches(pattern, branch),
            None => false,
        },
        Condition::EnvSet(var) => !env::var(var).unwrap_or_default().is_empty(),
        Condition::EnvEquals { var, value } => env::var(var).unwrap_or_default() == *value,
        Condition::FileContains { file, pattern, regex } => {
            evaluate_file_contains(file, pattern, *regex, env.cwd(), warnings)
        }
    }
}

/// Glob match with fallback to literal equality when the pattern does not
/// compile.
pub fn glob_matches(pattern: &str, candidate: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(candidate),
        Err(_) => pattern == candidate,
    }
}

fn evaluate_file_contains(
    file: &str,
    pattern: &str,
    use_regex: bool,
    cwd: &Path,
    warnings: &mut Vec<String>,
) -> bool {
    let compiled = if use_regex {
        if pattern.len() > MAX_REGEX_PATTERN_LEN {
            warnings.push(
                "[skill-bus] WARNING: fileContains regex pattern too long (>500 chars), skipping"
                    .to_string(),
            );
            return false;
        }
        match regex::Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warnings.push(format!(
                    "[skill-bus] WARNING: fileContains regex error: {}",
                    e
                ));
                return false;
            }
        }
    } else {
        None
    };

    let full_path = resolve_path(file, cwd);
    if full_path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
    {
        warnings.push(format!(
            "[skill-bus] WARNING: fileContains references dotfile '{}' - ensure this is intentional",
            file
        ));
    }
    if !full_path.is_file() {
        return false;
    }
    match fs::metadata(&full_path) {
        Ok(meta) if meta.len() > MAX_FILE_CONTAINS_BYTES => {
            warnings.push(format!(
                "[skill-bus] WARNING: fileContains skipped - file exceeds 1MB size limit: {}",
                file
            ));
            return false;
        }
        Ok(_) => {}
        Err(_) => return false,
    }
    let bytes = match fs::read(&full_path) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    // Binary content is tolerated: invalid sequences decode with replacement.
    let content = String::from_utf8_lossy(&bytes);
    for line in content.lines() {
        let hit = match &compiled {
            Some(re) => re.is_match(line),
            None => line.contains(pattern),
        };
        if hit {
            return true;
        }
    }
    false
}

/// Which condition list a failure came from. Telemetry records this so the
/// stats reader can tell inherited insert conditions from subscription ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondList {
    Insert,
    Subscription,
}

impl CondList {
    pub fn as_str(&self) -> &'static str {
        match self {
            CondList::Insert => "insert",
            CondList::Subscription => "subscription",
        }
    }
}

/// Location of the first failing condition in a stacked evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionFailure {
    pub list: CondList,
    pub index: usize,
}

/// Evaluate insert-level conditions then subscription-level conditions, in
/// declaration order, stopping at the first false. Returns None when every
/// condition passes.
pub fn evaluate_stack(
    insert_conditions: &[Value],
    sub_conditions: &[Value],
    env: &Environment,
    warnings: &mut Vec<String>,
) -> Option<ConditionFailure> {
    for (index, cond) in insert_conditions.iter().enumerate() {
        if !evaluate_value(cond, env, warnings) {
            return Some(ConditionFailure {
                list: CondList::Insert,
                index,
            });
        }
    }
    for (index, cond) in sub_conditions.iter().enumerate() {
        if !evaluate_value(cond, env, warnings) {
            return Some(ConditionFailure {
                list: CondList::Subscription,
                index,
            });
        }
    }
    None
}
