//! Configuration management for turnloop.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first by the binary):
//! - `LLM_API_KEY` - Required. API key for the chat-completions endpoint.
//! - `LLM_BASE_URL` - Optional. Endpoint base URL. Defaults to `https://openrouter.ai/api/v1`.
//! - `DEFAULT_MODEL` - Optional. Model identifier. Defaults to `moonshotai/kimi-k2.5`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.7`.
//! - `MAX_TOKENS` - Optional. Max output tokens per call. Defaults to `262144`.
//! - `MAX_TURNS_LLM_CONSECUTIVE` - Optional. Model calls per session. Defaults to `5`.
//! - `MAX_TURNS_SESSION` - Optional. Max conversation length in messages. Defaults to `20`.
//! - `TRANSCRIPT_DIR` - Optional. Where finished conversations are saved. Defaults to `data`.
//! - `SAVE_TRANSCRIPT` - Optional. Whether to save transcripts. Defaults to `true`.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_MODEL_NAME: &str = "moonshotai/kimi-k2.5";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 262_144;
pub const DEFAULT_MAX_TURNS_LLM_CONSECUTIVE: usize = 5;
pub const DEFAULT_MAX_TURNS_SESSION: usize = 20;
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Model identity and sampling parameters, passed with every model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Turn-budget policy for one session.
///
/// The two limits count different things and are checked independently:
/// model calls made by this session, and messages in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceConfig {
    pub max_turns_llm_consecutive: usize,
    pub max_turns_session: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_turns_llm_consecutive: DEFAULT_MAX_TURNS_LLM_CONSECUTIVE,
            max_turns_session: DEFAULT_MAX_TURNS_SESSION,
        }
    }
}

/// Transcript persistence settings.
#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("data"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the model endpoint
    pub api_key: String,

    /// Base URL of the chat-completions endpoint
    pub base_url: String,

    pub model: ModelConfig,

    pub inference: InferenceConfig,

    pub transcript: TranscriptConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `LLM_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for any value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("LLM_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let base_url = lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidValue("LLM_BASE_URL".to_string(), e.to_string()))?;

        let model = ModelConfig {
            model_name: lookup("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            temperature: parse_or(&lookup, "TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_tokens: parse_or(&lookup, "MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
        };

        let inference = InferenceConfig {
            max_turns_llm_consecutive: parse_or(
                &lookup,
                "MAX_TURNS_LLM_CONSECUTIVE",
                DEFAULT_MAX_TURNS_LLM_CONSECUTIVE,
            )?,
            max_turns_session: parse_or(&lookup, "MAX_TURNS_SESSION", DEFAULT_MAX_TURNS_SESSION)?,
        };

        let transcript = TranscriptConfig {
            enabled: lookup("SAVE_TRANSCRIPT")
                .map(|v| {
                    parse_bool(&v)
                        .map_err(|e| ConfigError::InvalidValue("SAVE_TRANSCRIPT".to_string(), e))
                })
                .transpose()?
                .unwrap_or(true),
            dir: lookup("TRANSCRIPT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
        };

        Ok(Self {
            api_key,
            base_url,
            model,
            inference,
            transcript,
        })
    }

    /// Create a config with default settings (useful for testing).
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model: ModelConfig::default(),
            inference: InferenceConfig::default(),
            transcript: TranscriptConfig::default(),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup_from(&[("LLM_API_KEY", "k")])).unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, ModelConfig::default());
        assert_eq!(config.inference, InferenceConfig::default());
        assert!(config.transcript.enabled);
        assert_eq!(config.transcript.dir, PathBuf::from("data"));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "LLM_API_KEY"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "k"),
            ("DEFAULT_MODEL", "openai/gpt-4o"),
            ("TEMPERATURE", "0.1"),
            ("MAX_TOKENS", "1000"),
            ("MAX_TURNS_LLM_CONSECUTIVE", "2"),
            ("MAX_TURNS_SESSION", "9"),
            ("SAVE_TRANSCRIPT", "off"),
            ("TRANSCRIPT_DIR", "/tmp/transcripts"),
        ]))
        .unwrap();

        assert_eq!(config.model.model_name, "openai/gpt-4o");
        assert_eq!(config.model.max_tokens, 1000);
        assert_eq!(config.inference.max_turns_llm_consecutive, 2);
        assert_eq!(config.inference.max_turns_session, 9);
        assert!(!config.transcript.enabled);
        assert_eq!(config.transcript.dir, PathBuf::from("/tmp/transcripts"));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = Config::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "k"),
            ("MAX_TURNS_SESSION", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "MAX_TURNS_SESSION"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("LLM_API_KEY", "k"),
            ("LLM_BASE_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "LLM_BASE_URL"));
    }
}
