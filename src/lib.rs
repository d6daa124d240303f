//! # turnloop
//!
//! A minimal agentic tool-use loop.
//!
//! This library provides:
//! - A turn engine that alternates between model calls and local tool execution
//! - A tool registry with explicit, declarative parameter schemas
//! - An OpenAI-compatible chat-completions client
//! - Flat JSON transcript capture
//!
//! ## Architecture
//!
//! The engine follows the "tools in a loop" pattern:
//! 1. Start from a conversation holding a system prompt and a user request
//! 2. Call the LLM with the conversation and available tool schemas
//! 3. Execute any tool calls in order and append their results
//! 4. Repeat until the LLM answers without tools or a turn budget runs out
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use turnloop::agent::{Conversation, TurnEngine};
//! use turnloop::config::{InferenceConfig, ModelConfig};
//! use turnloop::llm::ChatCompletionsClient;
//! use turnloop::tools::default_registry;
//!
//! let llm = Arc::new(ChatCompletionsClient::new("https://openrouter.ai/api/v1", api_key));
//! let tools = Arc::new(default_registry()?);
//! let specs = tools.specs();
//! let engine = TurnEngine::new(llm, tools);
//!
//! let conversation = Conversation::from_prompt("You are a helpful assistant.", "Weather in Lausanne?");
//! let answer = engine
//!     .run(conversation, &specs, &ModelConfig::default(), &InferenceConfig::default())
//!     .await?;
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod tools;
pub mod transcript;

pub use config::Config;
