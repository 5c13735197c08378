use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Stage;
use crate::session::ChatTurn;

/// Static asset played when speech synthesis is unavailable.
pub const FALLBACK_AUDIO_PATH: &str = "/static/fallback.mp3";

/// External provider a credential belongs to.
///
/// Serialized names match the keys accepted by the session config endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Speech-to-text (AssemblyAI).
    #[serde(rename = "aai")]
    Stt,
    /// Language model (Gemini).
    #[serde(rename = "gemini")]
    Llm,
    /// Speech synthesis (Murf).
    #[serde(rename = "murf")]
    Tts,
    Weather,
    Search,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Stt,
        ProviderKind::Llm,
        ProviderKind::Tts,
        ProviderKind::Weather,
        ProviderKind::Search,
    ];

    /// Key used in session config payloads.
    pub fn config_key(&self) -> &'static str {
        match self {
            ProviderKind::Stt => "aai",
            ProviderKind::Llm => "gemini",
            ProviderKind::Tts => "murf",
            ProviderKind::Weather => "weather",
            ProviderKind::Search => "search",
        }
    }

    /// Conventional environment variable holding the server-wide key.
    pub fn default_env_var(&self) -> &'static str {
        match self {
            ProviderKind::Stt => "ASSEMBLY_API_KEY",
            ProviderKind::Llm => "GEMINI_API_KEY",
            ProviderKind::Tts => "MURF_API_KEY",
            ProviderKind::Weather => "WEATHER_API_KEY",
            ProviderKind::Search => "TAVILY_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Per-request switches sent alongside the audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnFlags {
    #[serde(default)]
    pub perform_web_search: bool,
    #[serde(default)]
    pub concise: bool,
}

/// One conversational turn submitted to the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub session_id: String,
    pub audio: Vec<u8>,
    pub flags: TurnFlags,
    /// Debug-only: fail deterministically at this stage. Ignored unless the
    /// pipeline was built with forced failures enabled.
    pub forced_failure: Option<Stage>,
}

impl PipelineRequest {
    pub fn new(session_id: impl Into<String>, audio: Vec<u8>, flags: TurnFlags) -> Self {
        Self {
            session_id: session_id.into(),
            audio,
            flags,
            forced_failure: None,
        }
    }

    pub fn with_forced_failure(mut self, stage: Stage) -> Self {
        self.forced_failure = Some(stage);
        self
    }
}

/// Successful result of a conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub ok: bool,
    pub transcript: String,
    pub reply_text: String,
    /// Primary playback URL (first of `audio_urls`).
    pub audio_url: String,
    pub audio_urls: Vec<String>,
    pub history: Vec<ChatTurn>,
    /// True when synthesis degraded to the fallback asset.
    pub fallback: bool,
}

impl PipelineResponse {
    pub fn new(
        transcript: String,
        reply_text: String,
        audio_urls: Vec<String>,
        history: Vec<ChatTurn>,
        fallback: bool,
    ) -> Self {
        let audio_url = audio_urls.first().cloned().unwrap_or_default();
        Self {
            ok: true,
            transcript,
            reply_text,
            audio_url,
            audio_urls,
            history,
            fallback,
        }
    }
}
