use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown to end users whenever a request fails.
pub const FALLBACK_TEXT: &str = "I'm having trouble connecting right now";

#[derive(Debug, Error)]
pub enum ParleyError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ParleyError>;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Stt,
    Llm,
    Tts,
    Search,
    Weather,
    Agent,
    Internal,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Stt => "stt",
            Stage::Llm => "llm",
            Stage::Tts => "tts",
            Stage::Search => "search",
            Stage::Weather => "weather",
            Stage::Agent => "agent",
            Stage::Internal => "internal",
        }
    }

    /// Parse a stage tag such as `"stt"`. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "config" => Some(Stage::Config),
            "stt" => Some(Stage::Stt),
            "llm" => Some(Stage::Llm),
            "tts" => Some(Stage::Tts),
            "search" => Some(Stage::Search),
            "weather" => Some(Stage::Weather),
            "agent" => Some(Stage::Agent),
            "internal" => Some(Stage::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified pipeline failure, carrying the HTTP status the gateway
/// should answer with.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} failed ({http_status}): {detail}")]
pub struct StageError {
    pub stage: Stage,
    pub detail: String,
    pub http_status: u16,
}

impl StageError {
    pub fn new(stage: Stage, detail: impl Into<String>, http_status: u16) -> Self {
        Self {
            stage,
            detail: detail.into(),
            http_status,
        }
    }

    /// Missing or invalid credential.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::new(Stage::Config, detail, 500)
    }

    /// Non-success answer from an upstream provider.
    pub fn upstream(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, detail, 502)
    }

    pub fn timeout(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, detail, 504)
    }

    pub fn bad_request(stage: Stage, detail: impl Into<String>) -> Self {
        Self::new(stage, detail, 400)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(Stage::Internal, detail, 500)
    }

    /// Deterministic failure requested through the debug escape hatch.
    pub fn forced(stage: Stage) -> Self {
        Self::new(stage, "Forced failure for testing", 503)
    }
}
