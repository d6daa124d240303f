//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, LlmClient, LlmError, ToolCall};
use crate::config::ModelConfig;
use crate::tools::ToolSpec;

/// Client for any endpoint speaking the `/chat/completions` protocol
/// (OpenRouter, OpenAI, local gateways).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletionsClient {
    /// Create a client for `base_url` (e.g. `https://openrouter.ai/api/v1`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
        config: &ModelConfig,
    ) -> Result<ChatMessage, LlmError> {
        let tools = tools
            .filter(|specs| !specs.is_empty())
            .map(|specs| specs.iter().map(ToolSpec::to_schema).collect());

        let request = ChatRequest {
            model: &config.model_name,
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            tools,
        };

        tracing::info!(model = %config.model_name, messages = messages.len(), "Starting LLM call");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::MalformedResponse(format!("{}: {}", e, truncate(&body, 500))))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::MalformedResponse("response has no choices".to_string()))?;

        tracing::info!(
            tool_calls = message.tool_calls.as_ref().map_or(0, Vec::len),
            "LLM call succeeded"
        );

        Ok(ChatMessage::assistant(
            message.content,
            message.tool_calls.unwrap_or_default(),
        ))
    }
}

fn classify_failure(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth {
            status: status.as_u16(),
            body,
        },
        _ => LlmError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}... [truncated]", head)
    }
}
