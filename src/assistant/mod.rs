//! Assistant invocation - runs the external coding assistant with a fresh context
//!
//! Every call is independent: the prompt carries all the state the assistant
//! needs, nothing is continued from a previous session.

mod claude;
mod mock;

use std::time::Duration;

use async_trait::async_trait;

pub use claude::{ClaudeCli, locate_binary, parse_output};
pub use mock::ScriptedAssistant;

/// Prefix of the error text persisted in state and iteration logs
pub const SENTINEL: &str = "ERROR: ";

/// Characters of unparseable output kept in the error message
const RAW_PREVIEW_CHARS: usize = 500;

/// One invocation: prompt, tool allow-list and turn budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    pub prompt: String,
    pub tools: String,
    pub max_turns: u32,
}

impl AssistantRequest {
    pub fn new(prompt: impl Into<String>, tools: impl Into<String>, max_turns: u32) -> Self {
        Self {
            prompt: prompt.into(),
            tools: tools.into(),
            max_turns,
        }
    }
}

/// Stateless assistant - each call starts from a fresh context
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Run the assistant and return its result text
    async fn invoke(&self, request: &AssistantRequest) -> Result<String, AssistantError>;
}

/// Errors that can occur while invoking the assistant
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("'{binary}' command not found. Install Claude Code first.")]
    NotFound { binary: String },

    #[error("claude invocation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("no output from claude. stderr: {stderr}")]
    EmptyOutput { stderr: String },

    #[error("could not parse claude JSON output. raw: {raw}")]
    MalformedOutput { raw: String },

    #[error("unexpected error invoking claude: {0}")]
    Spawn(#[source] std::io::Error),
}

impl AssistantError {
    /// Build a malformed-output error keeping only a preview of the raw text
    pub fn malformed(raw: &str) -> Self {
        AssistantError::MalformedOutput {
            raw: raw.chars().take(RAW_PREVIEW_CHARS).collect(),
        }
    }

    /// Text stored in `last_error` and written to the iteration log
    pub fn sentinel_text(&self) -> String {
        format!("{}{}", SENTINEL, self)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AssistantError::NotFound { .. })
    }
}
