//! Agent module - the turn engine that drives one tool-using session.
//!
//! The engine follows a "tools in a loop" pattern:
//! 1. Check the turn budget
//! 2. Call the LLM with the conversation and the offered tools
//! 3. If the LLM requests tool calls, execute them in order and feed results back
//! 4. Repeat until the LLM produces a final response or a budget is spent

mod agent_loop;
mod conversation;
mod events;

pub use agent_loop::{SessionError, SessionOutcome, TurnEngine};
pub use conversation::{Conversation, ConversationError};
pub use events::{SessionEvent, StopReason};
