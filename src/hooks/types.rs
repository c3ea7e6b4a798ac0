use serde::{Deserialize, Serialize};

/// The three host hook events the dispatcher handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
}

impl HookEvent {
    /// Parse an event name from a CLI argument (case-insensitive).
    pub fn from_arg(s: &str) -> Option<HookEvent> {
        match s.to_lowercase().as_str() {
            "pretooluse" | "pre-tool-use" | "pre_tool_use" => Some(HookEvent::PreToolUse),
            "posttooluse" | "post-tool-use" | "post_tool_use" => Some(HookEvent::PostToolUse),
            "userpromptsubmit" | "user-prompt-submit" | "user_prompt_submit" => {
                Some(HookEvent::UserPromptSubmit)
            }
            _ => None,
        }
    }

    /// The envelope name the host expects in hookSpecificOutput.
    pub fn envelope_name(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
        }
    }
}

/// Raw JSON input from the host hook stdin.
/// Kept as a serde_json::Value to stay flexible; each path destructures
/// the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookInput {
    /// The raw JSON value from stdin.
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Result returned by the hook dispatch path.
#[derive(Debug, Clone)]
pub struct HookOutput {
    /// Text to write to stdout (may be empty).
    pub stdout: String,
    /// Process exit code. The dispatch path is infallible by contract and
    /// always reports 0.
    pub exit_code: i32,
}

impl HookOutput {
    pub fn ok(stdout: String) -> Self {
        Self {
            stdout,
            exit_code: 0,
        }
    }

    pub fn empty() -> Self {
        Self {
            stdout: String::new(),
            exit_code: 0,
        }
    }
}

/// Where an event came from. Telemetry and the response envelope both
/// carry this so provenance survives into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Tool,
    Prompt,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Tool => "tool",
            Source::Prompt => "prompt",
        }
    }
}

/// Subscription timing. Unknown strings are preserved at parse time and
/// rejected by the matcher with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Pre,
    Post,
    Complete,
}

impl Timing {
    pub fn from_str(s: &str) -> Option<Timing> {
        match s {
            "pre" => Some(Timing::Pre),
            "post" => Some(Timing::Post),
            "complete" => Some(Timing::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::Pre => "pre",
            Timing::Post => "post",
            Timing::Complete => "complete",
        }
    }
}
