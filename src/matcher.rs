//! Subscription matching: glob pattern, timing filter, condition stacking,
//! and the per-skill match ceiling.

use std::env;

use serde_json::json;

use crate::conditions::{self, Environment};
use crate::config::{EffectiveView, Insert, Settings, Subscription};
use crate::hooks::types::Timing;
use crate::telemetry;

/// Env var that forces the condition-skip echo on regardless of settings.
pub const DEBUG_ENV: &str = "SKILL_BUS_DEBUG";

/// Result of one matching pass.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Subscriptions to fire, in effective-list order, capped at the ceiling.
    pub matched: Vec<Subscription>,
    /// How many passed conditions before the ceiling was applied.
    pub total_matching: usize,
}

/// Validate the configured ceiling; anything below 1 reverts to the default
/// with a warning.
pub fn effective_max_matches(settings: &Settings, warnings: &mut Vec<String>) -> usize {
    if settings.max_matches_per_skill < 1 {
        warnings.push(format!(
            "[skill-bus] WARNING - invalid maxMatchesPerSkill={}, using default 3",
            settings.max_matches_per_skill
        ));
        return 3;
    }
    settings.max_matches_per_skill as usize
}

/// Effective conditions for a subscription: the insert's own conditions
/// (unless opted out) followed by the subscription's.
fn effective_condition_lists<'a>(
    sub: &'a Subscription,
    insert: Option<&'a Insert>,
) -> (&'a [serde_json::Value], &'a [serde_json::Value]) {
    let insert_conds: &[serde_json::Value] = if sub.inherit_conditions {
        insert.map(|i| i.conditions.as_slice()).unwrap_or(&[])
    } else {
        &[]
    };
    (insert_conds, sub.conditions.as_slice())
}

/// Match subscriptions for a tool-sourced skill event.
pub fn match_subscriptions(
    skill_name: &str,
    timing: Timing,
    view: &EffectiveView,
    env: &Environment,
    warnings: &mut Vec<String>,
) -> MatchOutcome {
    run_match(skill_name, view, env, warnings, None, |sub| {
        match Timing::from_str(&sub.when) {
            Some(when) => Ok(when == timing && conditions::glob_matches(&sub.on, skill_name)),
            None => Err(()),
        }
    })
}

/// Match subscriptions for a prompt-sourced slash command. Only pre timing
/// is eligible; bare command names additionally try the trailing segment of
/// qualified patterns.
pub fn match_prompt_subscriptions(
    cmd_name: &str,
    view: &EffectiveView,
    env: &Environment,
    warnings: &mut Vec<String>,
) -> MatchOutcome {
    run_match(cmd_name, view, env, warnings, Some("prompt"), |sub| {
        if sub.when != "pre" {
            return Ok(false);
        }
        Ok(prompt_pattern_matches(cmd_name, &sub.on))
    })
}

/// Prompt-monitor pattern semantics: a qualified command matches the full
/// pattern; a bare command tries the full pattern and, for qualified
/// patterns, the trailing segment (never a bare wildcard segment). Kept as
/// one function so the policy can be swapped.
pub fn prompt_pattern_matches(cmd_name: &str, pattern: &str) -> bool {
    if cmd_name.contains(':') {
        return conditions::glob_matches(pattern, cmd_name);
    }
    match pattern.split_once(':') {
        Some((_, suffix)) => {
            if suffix == "*" || suffix == "**" {
                return false;
            }
            conditions::glob_matches(suffix, cmd_name)
        }
        None => conditions::glob_matches(pattern, cmd_name),
    }
}

/// Shared matching loop. `eligible` decides pattern+timing eligibility and
/// reports Err for an invalid timing value.
fn run_match<F>(
    skill_name: &str,
    view: &EffectiveView,
    env: &Environment,
    warnings: &mut Vec<String>,
    telemetry_source: Option<&str>,
    eligible: F,
) -> MatchOutcome
where
    F: Fn(&Subscription) -> Result<bool, ()>,
{
    let max_matches = effective_max_matches(&view.settings, warnings);
    let mut outcome = MatchOutcome::default();
    let mut skipped: Vec<String> = Vec::new();

    for sub in &view.subscriptions {
        match eligible(sub) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(()) => {
                warnings.push(format!(
                    "[skill-bus] WARNING: subscription '{}' has invalid 'when' value: '{}'. Use 'pre', 'post', or 'complete'.",
                    if sub.insert.is_empty() { "unnamed" } else { sub.insert.as_str() },
                    sub.when
                ));
                continue;
            }
        }

        let insert = view.inserts.get(&sub.insert);
        let (insert_conds, sub_conds) = effective_condition_lists(sub, insert);
        if let Some(failure) = conditions::evaluate_stack(insert_conds, sub_conds, env, warnings) {
            skipped.push(sub.insert.clone());
            if view.settings.telemetry {
                let mut fields = vec![
                    ("skill", json!(skill_name)),
                    ("insert", json!(sub.insert)),
                    ("pattern", json!(sub.on)),
                    ("list", json!(failure.list.as_str())),
                    ("condition", json!(failure.index)),
                ];
                if let Some(source) = telemetry_source {
                    fields.push(("source", json!(source)));
                }
                telemetry::log_event("condition_skip", env.cwd(), &view.settings, &fields);
            }
            continue;
        }

        outcome.total_matching += 1;
        if outcome.matched.len() < max_matches {
            outcome.matched.push(sub.clone());
        }
    }

    if outcome.total_matching > max_matches {
        warnings.push(format!(
            "[skill-bus] {} subs matched but maxMatchesPerSkill={}, showing first {}",
            outcome.total_matching, max_matches, max_matches
        ));
    }

    let show_skips =
        view.settings.show_condition_skips || env::var(DEBUG_ENV).as_deref() == Ok("1");
    if !skipped.is_empty() && show_skips {
        warnings.push(format!(
            "[skill-bus] conditions not met, skipped: {}",
            skipped.join(", ")
        ));
    }

    outcome
}
