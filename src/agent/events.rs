use serde::Serialize;
use serde_json::Value;

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model replied without requesting tools.
    FinalAnswer,
    /// `max_turns_llm_consecutive` model calls were made.
    ConsecutiveTurnLimit,
    /// The conversation reached `max_turns_session` messages.
    SessionLengthLimit,
}

impl StopReason {
    pub fn is_budget_exhausted(&self) -> bool {
        !matches!(self, Self::FinalAnswer)
    }
}

/// Progress notifications emitted while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// About to call the model for the `turn`-th time.
    ModelCall { turn: usize },
    /// Model requested a tool.
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Tool finished; `content` is what the model will see.
    ToolResult {
        id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    /// Session reached its terminal state.
    Finished { stop_reason: StopReason },
}
