//! Completion-chain orchestration.
//!
//! A skill with completion-timing subscribers gets a synthetic instruction
//! appended at pre time telling the model to invoke the completion signal
//! when the skill's work is fully done. The signal invocation re-enters
//! dispatch with timing complete. Depth is carried in the signal's args and
//! the process environment; chains stop at depth 5.

use std::env;

use crate::conditions;
use crate::config::Subscription;

/// Reserved skill name the model invokes to declare a skill complete.
pub const COMPLETION_SIGNAL: &str = "skill-bus:complete";

/// Env var carrying the chain depth into a re-entered dispatch.
pub const CHAIN_DEPTH_ENV: &str = "SKILL_BUS_CHAIN_DEPTH";

/// A chain stops once this many completion dispatches have occurred.
pub const MAX_CHAIN_DEPTH: i64 = 5;

/// Parsed completion-signal invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub skill: String,
    pub depth: i64,
}

/// Parse the completion signal's args field: the completed skill name plus
/// an optional `--depth N` token. Returns None when no skill name remains
/// (missing args, args starting with `--`, or empty after stripping the
/// depth token); the caller exits silently.
pub fn parse_signal_args(args: &str) -> Option<CompletionRequest> {
    let trimmed = args.trim();
    if trimmed.is_empty() || trimmed.starts_with("--") {
        return None;
    }

    let mut skill_tokens: Vec<&str> = Vec::new();
    let mut depth: i64 = 0;
    let mut tokens = trimmed.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if token == "--depth" {
            if let Some(value) = tokens.next() {
                depth = value.parse().unwrap_or(0);
            }
        } else {
            skill_tokens.push(token);
        }
    }

    if skill_tokens.is_empty() {
        return None;
    }
    Some(CompletionRequest {
        skill: skill_tokens.join(" "),
        depth,
    })
}

/// Chain depth for the current process, from the reserved env var.
/// Unset or garbage means a fresh chain.
pub fn chain_depth_from_env(warnings: &mut Vec<String>) -> i64 {
    match env::var(CHAIN_DEPTH_ENV) {
        Err(_) => 0,
        Ok(raw) => match raw.parse::<i64>() {
            Ok(depth) if depth >= 0 => depth,
            _ => {
                warnings.push(format!(
                    "[skill-bus] WARNING: invalid {}='{}', defaulting to 0",
                    CHAIN_DEPTH_ENV, raw
                ));
                0
            }
        },
    }
}

/// True when at least one completion-timing subscription's pattern matches
/// the skill. Conditions are deliberately ignored here; they are re-checked
/// at completion time.
pub fn has_completion_subscribers(skill: &str, subscriptions: &[Subscription]) -> bool {
    subscriptions
        .iter()
        .any(|sub| sub.when == "complete" && conditions::glob_matches(&sub.on, skill))
}

/// The synthetic instruction appended to pre-timing output. Carries the
/// incremented depth explicitly so the next invocation can re-bound it.
pub fn completion_instruction(skill: &str, next_depth: i64) -> String {
    format!(
        "\n\n---\n[skill-bus] COMPLETION TRIGGER: When you have FULLY completed \
         the work described by this skill (not merely begun it, FULLY delivered all \
         outputs) you MUST invoke the Skill tool with skill: \"{}\" \
         and args: \"{} --depth {}\" to trigger \
         downstream subscriptions. Do NOT skip this step.",
        COMPLETION_SIGNAL, skill, next_depth
    )
}

/// The warning emitted when a chain hits the depth bound.
pub fn chain_exhausted_warning(depth: i64) -> String {
    format!(
        "[skill-bus] WARNING: chain depth limit reached ({}), stopping completion chain",
        depth
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::merge;
    use serde_json::json;

    #[test]
    fn test_parse_signal_args_plain_skill() {
        let req = parse_signal_args("plan:new").unwrap();
        assert_eq!(req.skill, "plan:new");
        assert_eq!(req.depth, 0);
    }

    #[test]
    fn test_parse_signal_args_with_depth() {
        let req = parse_signal_args("plan:new --depth 3").unwrap();
        assert_eq!(req.skill, "plan:new");
        assert_eq!(req.depth, 3);
    }

    #[test]
    fn test_parse_signal_args_depth_before_skill() {
        let req = parse_signal_args("--depth 2 plan:new");
        // Args starting with -- carry no skill name.
        assert!(req.is_none());
    }

    #[test]
    fn test_parse_signal_args_empty_and_missing() {
        assert!(parse_signal_args("").is_none());
        assert!(parse_signal_args("   ").is_none());
        assert!(parse_signal_args("--depth 2").is_none());
    }

    #[test]
    fn test_parse_signal_args_garbage_depth_defaults_to_zero() {
        let req = parse_signal_args("plan:new --depth soon").unwrap();
        assert_eq!(req.depth, 0);
    }

    #[test]
    fn test_chain_depth_from_env() {
        let _guard = crate::testutil::env_lock();
        let mut warnings = Vec::new();
        unsafe { env::remove_var(CHAIN_DEPTH_ENV) };
        assert_eq!(chain_depth_from_env(&mut warnings), 0);
        assert!(warnings.is_empty());

        unsafe { env::set_var(CHAIN_DEPTH_ENV, "2") };
        assert_eq!(chain_depth_from_env(&mut warnings), 2);

        unsafe { env::set_var(CHAIN_DEPTH_ENV, "soon") };
        assert_eq!(chain_depth_from_env(&mut warnings), 0);
        assert!(warnings[0].contains("invalid"));
        unsafe { env::remove_var(CHAIN_DEPTH_ENV) };
    }

    #[test]
    fn test_has_completion_subscribers_ignores_conditions() {
        let project = json!({
            "inserts": {"y": {"text": "Y", "conditions": [{"fileExists": "never-there"}]}},
            "subscriptions": [
                {"insert": "y", "on": "plan:*", "when": "complete"},
                {"insert": "y", "on": "other:*", "when": "pre"}
            ]
        });
        let mut warnings = Vec::new();
        let view = merge(None, Some(&project), &mut warnings);
        assert!(has_completion_subscribers("plan:new", &view.subscriptions));
        assert!(!has_completion_subscribers("other:thing", &view.subscriptions));
    }

    #[test]
    fn test_completion_instruction_carries_skill_and_depth() {
        let text = completion_instruction("plan:new", 1);
        assert!(text.contains("skill-bus:complete"));
        assert!(text.contains("plan:new --depth 1"));
        assert!(text.contains("COMPLETION TRIGGER"));
    }

    #[test]
    fn test_chain_exhausted_warning_names_depth() {
        assert!(chain_exhausted_warning(5).contains("chain depth limit reached (5)"));
    }
}
