//! Google Generative AI (Gemini) language model.
//!
//! Non-streaming `generateContent` call. The persona instruction, history and
//! utterance are flattened into a single text part. Auth is via the
//! `x-goog-api-key` header.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{GenerationRequest, LanguageModel, ProviderError, check_status, trim_base_url};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const TIMEOUT: Duration = Duration::from_secs(30);

pub struct GeminiClient {
    pub base_url: String,
    pub model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: Option<&str>, model: Option<&str>) -> Self {
        Self {
            base_url: trim_base_url(base_url, DEFAULT_BASE_URL),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Per-call timeout (default 30s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// --- Gemini request/response types ---

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate, if any.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let prompt = request.render();
        trace!(chars = prompt.len(), "Gemini prompt");

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, history = request.history.len(), "Calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let parsed: GeminiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(ProviderError::decode)?;

        parsed.first_text().ok_or(ProviderError::Empty("LLM response"))
    }
}
