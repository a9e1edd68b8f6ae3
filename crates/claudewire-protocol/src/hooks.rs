//! Hook types exchanged over the control channel
//!
//! Hooks are registered once during `initialize`: the engine assigns each
//! callback a stable id and advertises `{event: [{matcher, hookCallbackIds}]}`.
//! The peer later invokes a callback through a `hook_callback` control request
//! and expects a [`HookOutput`] in the success response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle events a hook can subscribe to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookEvent {
    /// Before a tool runs
    PreToolUse,
    /// After a tool ran
    PostToolUse,
    /// A notification is shown to the user
    Notification,
    /// The user submitted a prompt
    UserPromptSubmit,
    /// A session starts or resumes
    SessionStart,
    /// A session ends
    SessionEnd,
    /// The main agent stops
    Stop,
    /// A subagent stops
    SubagentStop,
    /// The transcript is about to be compacted
    PreCompact,
}

impl HookEvent {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Notification => "Notification",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
        }
    }
}

/// One matcher entry in the `initialize` hook table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookMatcherConfig {
    /// Tool-name pattern, or `None` to match everything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,

    /// Callback ids invoked when the matcher fires
    #[serde(rename = "hookCallbackIds")]
    pub hook_callback_ids: Vec<String>,
}

/// Output returned by a hook callback
///
/// All fields are optional; an empty output lets execution proceed unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Whether execution should continue
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,

    /// Hide the hook's stdout from the transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,

    /// Message shown when `continue` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// "approve" or "block"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,

    /// Warning shown to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Feedback for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Event-specific output, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<Value>,
}

impl HookOutput {
    /// Let execution proceed
    pub fn proceed() -> Self {
        Self {
            continue_: Some(true),
            ..Self::default()
        }
    }

    /// Stop execution with a reason shown to the user
    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            continue_: Some(false),
            stop_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Block the pending action with feedback for the model
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Some("block".to_string()),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Attach event-specific output
    pub fn with_hook_specific_output(mut self, output: Value) -> Self {
        self.hook_specific_output = Some(output);
        self
    }
}
