//! Core turn engine: call the model, run requested tools, repeat.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{InferenceConfig, ModelConfig};
use crate::llm::{ChatMessage, LlmClient, LlmError, Role, ToolCall};
use crate::tools::{ToolOutcome, ToolRegistry, ToolSpec};
use crate::transcript::TranscriptStore;

use super::conversation::{Conversation, ConversationError};
use super::events::{SessionEvent, StopReason};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("conversation invariant violated: {0}")]
    Conversation(#[from] ConversationError),

    #[error("initial conversation has no user message")]
    MissingUserMessage,

    #[error("initial conversation has unanswered tool calls: {}", .0.join(", "))]
    UnansweredToolCalls(Vec<String>),
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    /// Final answer, or the last message's content when a budget ran out.
    pub answer: Option<String>,
    pub stop_reason: StopReason,
    pub model_calls: usize,
    pub conversation: Conversation,
}

/// Turn-engine states.
enum SessionState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done {
        stop_reason: StopReason,
        answer: Option<String>,
    },
}

/// Drives sessions against a model backend and a tool registry.
///
/// # Algorithm
/// 1. Check the turn budget; stop without a model call if it is spent
/// 2. Call the model and append its reply to the conversation
/// 3. No tool calls: the reply is the final answer
/// 4. Otherwise run every requested tool in order, append one tool message
///    per call, and go back to 1
pub struct TurnEngine {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    transcripts: Option<Arc<dyn TranscriptStore>>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl TurnEngine {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            transcripts: None,
            events: None,
        }
    }

    /// Save every finished conversation to `store`.
    pub fn with_transcript_store(mut self, store: Arc<dyn TranscriptStore>) -> Self {
        self.transcripts = Some(store);
        self
    }

    /// Report progress on `sender`. A closed receiver is ignored.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a session and return only its answer.
    pub async fn run(
        &self,
        conversation: Conversation,
        tool_specs: &[ToolSpec],
        model_config: &ModelConfig,
        inference_config: &InferenceConfig,
    ) -> Result<Option<String>, SessionError> {
        self.run_session(conversation, tool_specs, model_config, inference_config)
            .await
            .map(|outcome| outcome.answer)
    }

    /// Drive `conversation` from the first model call to a terminal state.
    ///
    /// `tool_specs` are offered to the model; an empty slice offers none.
    ///
    /// # Errors
    ///
    /// Model gateway failures end the session. Tool problems never do: they
    /// are reported to the model as tool messages.
    pub async fn run_session(
        &self,
        conversation: Conversation,
        tool_specs: &[ToolSpec],
        model_config: &ModelConfig,
        inference_config: &InferenceConfig,
    ) -> Result<SessionOutcome, SessionError> {
        if !conversation.messages().iter().any(|m| m.role == Role::User) {
            return Err(SessionError::MissingUserMessage);
        }
        if !conversation.open_tool_calls().is_empty() {
            return Err(SessionError::UnansweredToolCalls(
                conversation.open_tool_calls().to_vec(),
            ));
        }

        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("session", id = %session_id, model = %model_config.model_name);

        let outcome = self
            .drive(session_id, conversation, tool_specs, model_config, inference_config)
            .instrument(span)
            .await?;

        if let Some(store) = &self.transcripts {
            if let Err(e) = store.save(outcome.conversation.messages()).await {
                tracing::warn!(session = %session_id, "Failed to save transcript: {}", e);
            }
        }

        Ok(outcome)
    }

    async fn drive(
        &self,
        session_id: Uuid,
        mut conversation: Conversation,
        tool_specs: &[ToolSpec],
        model_config: &ModelConfig,
        inference_config: &InferenceConfig,
    ) -> Result<SessionOutcome, SessionError> {
        let offered = (!tool_specs.is_empty()).then_some(tool_specs);
        let mut turn_count = 0usize;
        let mut state = SessionState::AwaitingModel;

        let (stop_reason, answer) = loop {
            state = match state {
                SessionState::AwaitingModel => {
                    if let Some(reason) =
                        budget_exhausted(turn_count, conversation.len(), inference_config)
                    {
                        tracing::warn!(
                            "Turn budget reached ({:?}: {} model calls of {}, {} messages of {}), stopping session",
                            reason,
                            turn_count,
                            inference_config.max_turns_llm_consecutive,
                            conversation.len(),
                            inference_config.max_turns_session,
                        );
                        SessionState::Done {
                            stop_reason: reason,
                            answer: conversation.last().and_then(|m| m.content.clone()),
                        }
                    } else {
                        turn_count += 1;
                        tracing::info!(
                            "LLM consecutive turn {}/{}",
                            turn_count,
                            inference_config.max_turns_llm_consecutive
                        );
                        self.emit(SessionEvent::ModelCall { turn: turn_count });

                        let reply = self
                            .llm
                            .chat_completion(conversation.messages(), offered, model_config)
                            .await?;
                        let tool_calls = reply.requested_tool_calls().to_vec();
                        let content = reply.content.clone();
                        conversation.push(reply)?;

                        if tool_calls.is_empty() {
                            SessionState::Done {
                                stop_reason: StopReason::FinalAnswer,
                                answer: content,
                            }
                        } else {
                            SessionState::ExecutingTools(tool_calls)
                        }
                    }
                }
                SessionState::ExecutingTools(tool_calls) => {
                    for tool_call in &tool_calls {
                        let outcome = self.execute_tool_call(tool_call).await;
                        let is_error = outcome.is_error();
                        let content = outcome.into_content();

                        self.emit(SessionEvent::ToolResult {
                            id: tool_call.id.clone(),
                            name: tool_call.function.name.clone(),
                            content: content.clone(),
                            is_error,
                        });

                        conversation.push(ChatMessage::tool_result(tool_call, content))?;
                    }
                    SessionState::AwaitingModel
                }
                SessionState::Done {
                    stop_reason,
                    answer,
                } => break (stop_reason, answer),
            };
        };

        tracing::debug!(?stop_reason, model_calls = turn_count, "Session finished");
        self.emit(SessionEvent::Finished { stop_reason });

        Ok(SessionOutcome {
            session_id,
            answer,
            stop_reason,
            model_calls: turn_count,
            conversation,
        })
    }

    /// Execute a single tool call. Never fails: problems become error text.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> ToolOutcome {
        let name = tool_call.function.name.as_str();

        if !self.tools.contains(name) {
            tracing::warn!("Unknown tool: {}", name);
            self.emit(SessionEvent::ToolCall {
                id: tool_call.id.clone(),
                name: name.to_string(),
                arguments: Value::Null,
            });
            return ToolOutcome::UnknownTool(name.to_string());
        }

        let args = match decode_arguments(&tool_call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Malformed arguments for tool {}: {}", name, e);
                self.emit(SessionEvent::ToolCall {
                    id: tool_call.id.clone(),
                    name: name.to_string(),
                    arguments: Value::String(tool_call.function.arguments.clone()),
                });
                return ToolOutcome::InvalidArguments(format!(
                    "could not decode arguments for tool '{}': {}",
                    name, e
                ));
            }
        };

        self.emit(SessionEvent::ToolCall {
            id: tool_call.id.clone(),
            name: name.to_string(),
            arguments: args.clone(),
        });
        tracing::debug!("Calling tool: {} with args: {}", name, args);

        let outcome = self.tools.invoke(name, args).await;
        if let ToolOutcome::Failed(reason) = &outcome {
            tracing::warn!("Tool {} failed: {}", name, reason);
        }
        outcome
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}

/// Which budget, if any, forbids another model call. The two limits use
/// separate counters.
fn budget_exhausted(
    turn_count: usize,
    conversation_len: usize,
    config: &InferenceConfig,
) -> Option<StopReason> {
    if turn_count >= config.max_turns_llm_consecutive {
        Some(StopReason::ConsecutiveTurnLimit)
    } else if conversation_len >= config.max_turns_session {
        Some(StopReason::SessionLengthLimit)
    } else {
        None
    }
}

/// Decode a model-supplied argument string. Blank means "no arguments".
fn decode_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str(raw)
    }
}
