//! turnloop - command-line entry point
//!
//! Runs one tool-using session for a single user message and prints the answer.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnloop::agent::{Conversation, StopReason, TurnEngine};
use turnloop::config::Config;
use turnloop::llm::ChatCompletionsClient;
use turnloop::tools;
use turnloop::transcript::FileTranscriptStore;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that responds to the user.";

#[derive(Debug, Parser)]
#[command(name = "turnloop", version, about = "Ask an LLM a question and let it use tools to answer")]
struct Cli {
    /// The user message that starts the session
    message: String,

    /// System prompt
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system: String,

    /// Model identifier (overrides DEFAULT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature (overrides TEMPERATURE)
    #[arg(long)]
    temperature: Option<f32>,

    /// Max output tokens per model call (overrides MAX_TOKENS)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Comma-separated tools to offer; all registered tools when omitted
    #[arg(long, value_delimiter = ',')]
    tools: Option<Vec<String>>,

    /// Max model calls for the session (overrides MAX_TURNS_LLM_CONSECUTIVE)
    #[arg(long)]
    max_turns: Option<usize>,

    /// Max conversation length in messages (overrides MAX_TURNS_SESSION)
    #[arg(long)]
    max_session_messages: Option<usize>,

    /// Do not save the conversation transcript
    #[arg(long)]
    no_transcript: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnloop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    apply_overrides(&mut config, &cli);
    info!(
        "Loaded configuration: model={}, max_turns={}, max_session_messages={}",
        config.model.model_name,
        config.inference.max_turns_llm_consecutive,
        config.inference.max_turns_session
    );

    let registry = tools::init_global(tools::default_registry()?)?;
    let tool_specs = match &cli.tools {
        Some(names) => registry.select(names.as_slice())?,
        None => registry.specs(),
    };

    let llm = Arc::new(ChatCompletionsClient::new(
        config.base_url.clone(),
        config.api_key.clone(),
    ));
    let mut engine = TurnEngine::new(llm, registry);
    if config.transcript.enabled {
        engine = engine.with_transcript_store(Arc::new(FileTranscriptStore::new(
            config.transcript.dir.clone(),
        )));
    }

    let conversation = Conversation::from_prompt(cli.system.clone(), cli.message.clone());
    let outcome = engine
        .run_session(conversation, &tool_specs, &config.model, &config.inference)
        .await?;

    if outcome.stop_reason.is_budget_exhausted() {
        tracing::warn!(
            "Session stopped after {} model call(s) without a final reply",
            outcome.model_calls
        );
    }
    println!("{}", render_answer(outcome.answer.as_deref(), outcome.stop_reason));

    Ok(())
}

fn render_answer(answer: Option<&str>, stop_reason: StopReason) -> String {
    match (answer, stop_reason.is_budget_exhausted()) {
        (Some(answer), false) => format!("Final answer: {}", answer),
        (Some(answer), true) => format!("Budget exhausted ({:?}), last message: {}", stop_reason, answer),
        (None, _) => format!("No answer ({:?})", stop_reason),
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.model.model_name = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        config.model.temperature = temperature;
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.model.max_tokens = max_tokens;
    }
    if let Some(max_turns) = cli.max_turns {
        config.inference.max_turns_llm_consecutive = max_turns;
    }
    if let Some(max_messages) = cli.max_session_messages {
        config.inference.max_turns_session = max_messages;
    }
    if cli.no_transcript {
        config.transcript.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "turnloop",
            "hello",
            "--model",
            "openai/gpt-4o",
            "--tools",
            "web_search,fetch_url",
            "--max-turns",
            "2",
            "--no-transcript",
        ]);
        let mut config = Config::new("k".to_string(), "http://localhost".to_string());
        apply_overrides(&mut config, &cli);

        assert_eq!(cli.message, "hello");
        assert_eq!(cli.system, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(
            cli.tools,
            Some(vec!["web_search".to_string(), "fetch_url".to_string()])
        );
        assert_eq!(config.model.model_name, "openai/gpt-4o");
        assert_eq!(config.inference.max_turns_llm_consecutive, 2);
        assert!(!config.transcript.enabled);
    }

    #[test]
    fn budget_stops_are_not_presented_as_final_answers() {
        assert_eq!(
            render_answer(Some("Sunny."), StopReason::FinalAnswer),
            "Final answer: Sunny."
        );
        assert_eq!(
            render_answer(Some("echo: hi"), StopReason::ConsecutiveTurnLimit),
            "Budget exhausted (ConsecutiveTurnLimit), last message: echo: hi"
        );
        assert_eq!(
            render_answer(None, StopReason::SessionLengthLimit),
            "No answer (SessionLengthLimit)"
        );
    }
}
