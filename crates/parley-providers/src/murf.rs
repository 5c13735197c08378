//! Murf speech synthesis.
//!
//! `speech/generate` usually answers with the audio URL directly. When it
//! only returns a job id the client polls `speech/{id}` until a URL appears.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::poll::{PollPolicy, PollStatus, poll_bounded};
use crate::{DEFAULT_TTS_MAX_CHARS, ProviderError, SpeechSynthesis, check_status, trim_base_url};

const DEFAULT_BASE_URL: &str = "https://api.murf.ai";

const TIMEOUT: Duration = Duration::from_secs(20);

pub struct MurfClient {
    pub base_url: String,
    poll: PollPolicy,
    timeout: Duration,
    client: reqwest::Client,
}

impl MurfClient {
    pub fn new(base_url: Option<&str>, poll: PollPolicy) -> Self {
        Self {
            base_url: trim_base_url(base_url, DEFAULT_BASE_URL),
            poll,
            timeout: TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Per-call timeout (default 20s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn check(&self, id: &str, api_key: &str) -> Result<PollStatus<String>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/speech/{}", self.base_url, id))
            .header("api-key", api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        let body: SpeechResponse = check_status(response).await?.json().await?;
        Ok(match body.audio_url() {
            Some(url) => PollStatus::Ready(url),
            None => PollStatus::Pending,
        })
    }
}

// --- Murf response types ---

/// `audioFile` arrives either as a bare URL or as `{ "url": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudioFile {
    Url(String),
    Object { url: Option<String> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechResponse {
    #[serde(default)]
    audio_file: Option<AudioFile>,
    #[serde(default)]
    id: Option<String>,
}

impl SpeechResponse {
    fn audio_url(&self) -> Option<String> {
        match self.audio_file.as_ref()? {
            AudioFile::Url(url) => Some(url.clone()),
            AudioFile::Object { url } => url.clone(),
        }
        .filter(|u| !u.is_empty())
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn clamp_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl SpeechSynthesis for MurfClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        let text = clamp_chars(text, DEFAULT_TTS_MAX_CHARS);
        if text.trim().is_empty() {
            return Err(ProviderError::Empty("synthesis text"));
        }

        let response = self
            .client
            .post(format!("{}/v1/speech/generate", self.base_url))
            .header("api-key", api_key)
            .json(&json!({
                "text": text,
                "voice_id": voice_id,
                "style": "Conversational",
                "format": "mp3",
            }))
            .timeout(self.timeout)
            .send()
            .await?;
        let body: SpeechResponse = check_status(response).await?.json().await?;

        if let Some(url) = body.audio_url() {
            return Ok(url);
        }
        let Some(id) = body.id else {
            return Err(ProviderError::Decode(
                "Murf response had neither audioFile nor id".into(),
            ));
        };
        debug!(job_id = %id, "Polling Murf job");
        poll_bounded(self.poll, |_| self.check(&id, api_key)).await
    }
}
