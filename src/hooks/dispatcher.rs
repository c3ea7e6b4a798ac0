//! Hook entrypoint: stdin event -> fast filter -> merge -> match -> output.
//!
//! Three event shapes arrive from the host: tool-pre and tool-post (a skill
//! runs as a tool call) and prompt-submit (the user typed a slash command).
//! The dispatch path is infallible by contract: the worst outcome is that a
//! skill loads with no injected context.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::json;

use crate::conditions::Environment;
use crate::config;
use crate::hooks::completion::{self, COMPLETION_SIGNAL, MAX_CHAIN_DEPTH};
use crate::hooks::fast_filter::{self, FilterDecision};
use crate::hooks::output;
use crate::hooks::types::{HookEvent, HookInput, HookOutput, Source, Timing};
use crate::matcher;
use crate::telemetry;

/// Built-in slash commands that never reach subscription matching.
const BUILTIN_COMMANDS: &[&str] = &[
    "help", "clear", "compact", "init", "login", "logout", "config", "status", "doctor", "memory",
    "cost", "tasks",
];

/// Past this elapsed time a warning is appended; the host kills at 5 s.
const TIMEOUT_WARN_SECS: f64 = 4.0;

/// Dispatch one hook event. Never panics; bad input degrades to an empty
/// pass-through with exit 0.
pub fn dispatch(event: &HookEvent, stdin_json: &str) -> (String, i32) {
    let start = Instant::now();
    let input = match serde_json::from_str::<HookInput>(stdin_json) {
        Ok(input) => input,
        Err(_) => return (String::new(), 0),
    };

    let output = match event {
        HookEvent::PreToolUse => handle_tool(&input, Timing::Pre, start),
        HookEvent::PostToolUse => handle_tool(&input, Timing::Post, start),
        HookEvent::UserPromptSubmit => handle_prompt(&input, start),
    };
    (output.stdout, output.exit_code)
}

/// Convenience: dispatch from raw CLI args.
pub fn dispatch_from_cli(event_name: &str, stdin_json: &str) -> Result<(String, i32), String> {
    let event = HookEvent::from_arg(event_name)
        .ok_or_else(|| format!("Unknown hook event: {}", event_name))?;
    Ok(dispatch(&event, stdin_json))
}

fn event_cwd(input: &HookInput) -> PathBuf {
    input
        .data
        .get("cwd")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn message_only(message: &str) -> HookOutput {
    HookOutput::ok(json!({ "systemMessage": message }).to_string())
}

fn handle_tool(input: &HookInput, timing: Timing, start: Instant) -> HookOutput {
    let tool_name = input
        .data
        .get("tool_name")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if tool_name != "Skill" {
        return HookOutput::empty();
    }
    let skill = input.data["tool_input"]["skill"].as_str().unwrap_or("");
    if skill.is_empty() {
        return HookOutput::empty();
    }
    let cwd = event_cwd(input);

    if skill == COMPLETION_SIGNAL {
        return handle_completion_signal(input, timing, &cwd, start);
    }

    match fast_filter::check(&cwd, skill) {
        FilterDecision::Proceed => run_full_dispatch(skill, timing, &cwd, Source::Tool, start),
        FilterDecision::RejectSilently => HookOutput::empty(),
        FilterDecision::EmitNudge(message) => message_only(&message),
        FilterDecision::LogNoCoverage => {
            log_no_coverage(&cwd, skill, "fast-path");
            HookOutput::empty()
        }
    }
}

fn handle_prompt(input: &HookInput, start: Instant) -> HookOutput {
    let prompt = input
        .data
        .get("prompt")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let trimmed = prompt.trim_start();
    if !trimmed.starts_with('/') {
        return HookOutput::empty();
    }
    let body = &trimmed[1..];
    let command = match body.split_whitespace().next() {
        Some(command) => command,
        None => return HookOutput::empty(),
    };
    let cwd = event_cwd(input);

    if command == COMPLETION_SIGNAL {
        let args = body[command.len()..].trim();
        return handle_completion_args(args, &cwd, Source::Prompt, start);
    }
    if BUILTIN_COMMANDS.contains(&command) {
        return HookOutput::empty();
    }
    if !fast_filter::prompt_monitor_enabled(&cwd) {
        return HookOutput::empty();
    }

    match fast_filter::check(&cwd, command) {
        FilterDecision::Proceed => run_full_dispatch(command, Timing::Pre, &cwd, Source::Prompt, start),
        FilterDecision::RejectSilently => HookOutput::empty(),
        FilterDecision::EmitNudge(message) => message_only(&message),
        FilterDecision::LogNoCoverage => {
            log_no_coverage(&cwd, command, "prompt-fast-path");
            HookOutput::empty()
        }
    }
}

/// Completion-signal routing (C1 side). Post-timing invocations are no-ops;
/// depth >= 5 is chain-exhausted; otherwise re-enter dispatch with timing
/// complete and the incremented depth in the process environment.
fn handle_completion_signal(
    input: &HookInput,
    timing: Timing,
    cwd: &Path,
    start: Instant,
) -> HookOutput {
    if timing == Timing::Post {
        return HookOutput::empty();
    }
    let args = match input.data["tool_input"]["args"].as_str() {
        Some(args) => args,
        None => return HookOutput::empty(),
    };
    handle_completion_args(args, cwd, Source::Tool, start)
}

fn handle_completion_args(args: &str, cwd: &Path, source: Source, start: Instant) -> HookOutput {
    let request = match completion::parse_signal_args(args) {
        Some(request) => request,
        None => return HookOutput::empty(),
    };
    if request.depth >= MAX_CHAIN_DEPTH {
        return message_only(&completion::chain_exhausted_warning(request.depth));
    }
    unsafe {
        env::set_var(
            completion::CHAIN_DEPTH_ENV,
            (request.depth + 1).to_string(),
        )
    };
    run_full_dispatch(&request.skill, Timing::Complete, cwd, source, start)
}

/// The rare slow branch of a fast-path rejection: parse settings so the
/// no-coverage event lands in the configured telemetry file.
fn log_no_coverage(cwd: &Path, skill: &str, source: &str) {
    let mut warnings = Vec::new();
    let (global, project) = config::load_configs(cwd, &mut warnings);
    let view = config::merge(global.as_ref(), project.as_ref(), &mut warnings);
    if view.settings.telemetry && view.settings.observe_unmatched {
        telemetry::log_event(
            "no_match",
            cwd,
            &view.settings,
            &[("skill", json!(skill)), ("source", json!(source))],
        );
    }
}

fn envelope_for(source: Source, timing: Timing) -> &'static str {
    match source {
        Source::Prompt => HookEvent::UserPromptSubmit.envelope_name(),
        Source::Tool => match timing {
            Timing::Post => HookEvent::PostToolUse.envelope_name(),
            _ => HookEvent::PreToolUse.envelope_name(),
        },
    }
}

/// The full merge-and-evaluate path shared by tool, prompt, and completion
/// dispatches.
fn run_full_dispatch(
    skill: &str,
    timing: Timing,
    cwd: &Path,
    source: Source,
    start: Instant,
) -> HookOutput {
    let mut warnings: Vec<String> = Vec::new();
    let (global, project) = config::load_configs(cwd, &mut warnings);
    let view = config::merge(global.as_ref(), project.as_ref(), &mut warnings);

    if !view.settings.enabled {
        return message_only("[skill-bus] Disabled via settings (\"enabled\": false).");
    }
    if source == Source::Prompt && !view.settings.monitor_slash_commands {
        return HookOutput::empty();
    }
    if timing == Timing::Complete && !view.settings.completion_hooks {
        return HookOutput::empty();
    }

    let environment = Environment::new(cwd);
    let outcome = if source == Source::Prompt && timing != Timing::Complete {
        matcher::match_prompt_subscriptions(skill, &view, &environment, &mut warnings)
    } else {
        matcher::match_subscriptions(skill, timing, &view, &environment, &mut warnings)
    };

    // The completion-trigger check runs even when no pre-subscription
    // matched: a skill may have zero pre subs but still need the instruction.
    let mut instruction = None;
    if timing == Timing::Pre
        && view.settings.completion_hooks
        && completion::has_completion_subscribers(skill, &view.subscriptions)
    {
        let depth = completion::chain_depth_from_env(&mut warnings);
        instruction = Some(completion::completion_instruction(skill, depth + 1));
    }

    if view.settings.telemetry {
        for sub in &outcome.matched {
            telemetry::log_event(
                "match",
                cwd,
                &view.settings,
                &[
                    ("skill", json!(skill)),
                    ("insert", json!(sub.insert)),
                    ("timing", json!(timing.as_str())),
                    ("source", json!(source.as_str())),
                ],
            );
        }
        if timing == Timing::Complete && !outcome.matched.is_empty() {
            telemetry::log_event("skill_complete", cwd, &view.settings, &[("skill", json!(skill))]);
        }
        if outcome.matched.is_empty() && view.settings.observe_unmatched {
            telemetry::log_event(
                "no_match",
                cwd,
                &view.settings,
                &[("skill", json!(skill)), ("source", json!(source.as_str()))],
            );
        }
    }

    if outcome.matched.is_empty() && warnings.is_empty() && instruction.is_none() {
        return HookOutput::empty();
    }

    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > TIMEOUT_WARN_SECS {
        warnings.push(format!(
            "[skill-bus] WARNING: dispatch took {:.1}s (5s timeout), context may be incomplete",
            elapsed
        ));
    }

    match output::build_response(
        &outcome.matched,
        envelope_for(source, timing),
        source,
        &view,
        cwd,
        instruction.as_deref(),
        &mut warnings,
    ) {
        Some(value) => HookOutput::ok(value.to_string()),
        None => HookOutput::empty(),
    }
}
