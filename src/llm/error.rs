use thiserror::Error;

/// Failure of a single gateway call. Always fatal to the current turn.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("authentication rejected (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Whether a caller-side retry policy could reasonably try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth { .. } | Self::MalformedResponse(_) => false,
        }
    }
}
