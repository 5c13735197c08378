//! Provider abstraction.
//!
//! Each external service sits behind a small async trait so the pipeline can
//! be driven by the real HTTP clients in production and by in-process stubs
//! in tests. All clients are non-blocking (`reqwest`), so no call here ever
//! stalls the runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use parley_core::error::{Stage, StageError};
use parley_core::session::ChatTurn;

pub mod assemblyai;
pub mod gemini;
pub mod murf;
pub mod openweather;
pub mod poll;
pub mod tavily;

pub use poll::{PollPolicy, PollStatus, poll_bounded};

/// Longest text a single synthesis call accepts.
pub const DEFAULT_TTS_MAX_CHARS: usize = 3000;

/// Upstream bodies are truncated to this many bytes in error messages.
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Always built through `From`, which strips the request URL so query
    /// string credentials never reach messages.
    #[error("Transport error: {0}")]
    Transport(reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid API key")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Empty {0}")]
    Empty(&'static str),

    #[error("Job rejected: {0}")]
    Rejected(String),

    #[error("Gave up after {attempts} poll attempts")]
    PollExhausted { attempts: u32 },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.without_url())
    }
}

impl ProviderError {
    /// Body that arrived but could not be decoded.
    pub(crate) fn decode(err: reqwest::Error) -> Self {
        ProviderError::Decode(err.without_url().to_string())
    }

    /// Build a `Status` error, truncating the upstream body.
    pub fn status(status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return ProviderError::Unauthorized;
        }
        let mut end = body.len().min(ERROR_BODY_LIMIT);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        ProviderError::Status {
            status: status.as_u16(),
            body: body[..end].to_string(),
        }
    }

    /// Classify into the pipeline error taxonomy.
    pub fn into_stage_error(self, stage: Stage) -> StageError {
        match self {
            ProviderError::PollExhausted { .. } => StageError::timeout(stage, self.to_string()),
            ProviderError::Transport(ref e) if e.is_timeout() => {
                StageError::timeout(stage, self.to_string())
            }
            other => StageError::upstream(stage, other.to_string()),
        }
    }
}

/// Check a response status, turning failures into [`ProviderError`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::status(status, &body))
}

pub(crate) fn trim_base_url(base_url: Option<&str>, default: &str) -> String {
    base_url.unwrap_or(default).trim_end_matches('/').to_string()
}

// --- Generation request ---

/// One language-model call: persona instruction, bounded history, and the
/// current (enriched) utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub utterance: String,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, history: Vec<ChatTurn>, utterance: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history,
            utterance: utterance.into(),
        }
    }

    /// Flatten into a single role-labelled prompt ending in an assistant cue.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.system.len()
                + self.utterance.len()
                + self.history.iter().map(|t| t.content.len() + 12).sum::<usize>()
                + 32,
        );
        out.push_str(self.system.trim());
        out.push_str("\n\n");
        for turn in &self.history {
            out.push_str(turn.role.label());
            out.push_str(": ");
            out.push_str(turn.content.trim());
            out.push('\n');
        }
        out.push_str("User: ");
        out.push_str(self.utterance.trim());
        out.push_str("\nAssistant:");
        out
    }
}

// --- Provider traits ---

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe raw audio. An empty transcript is returned as `Ok("")`;
    /// callers decide whether that is an error.
    async fn transcribe(&self, audio: &[u8], api_key: &str) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Synthesize `text` and return a playable audio URL.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        api_key: &str,
    ) -> Result<String, ProviderError>;

    /// Per-call character budget.
    fn max_chars(&self) -> usize {
        DEFAULT_TTS_MAX_CHARS
    }
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Human-readable summary of the current weather in `city`.
    async fn current(&self, city: &str, api_key: &str) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Human-readable digest of the top results for `query`.
    async fn search(&self, query: &str, api_key: &str) -> Result<String, ProviderError>;
}
