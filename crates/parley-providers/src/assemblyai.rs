//! AssemblyAI speech-to-text.
//!
//! Three calls per transcription: upload the raw bytes, submit a transcript
//! job for the returned upload URL, then poll the job until it completes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::poll::{PollPolicy, PollStatus, poll_bounded};
use crate::{ProviderError, SpeechToText, check_status, trim_base_url};

const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

const TIMEOUT: Duration = Duration::from_secs(60);

pub struct AssemblyAiClient {
    pub base_url: String,
    poll: PollPolicy,
    timeout: Duration,
    client: reqwest::Client,
}

impl AssemblyAiClient {
    pub fn new(base_url: Option<&str>, poll: PollPolicy) -> Self {
        Self {
            base_url: trim_base_url(base_url, DEFAULT_BASE_URL),
            poll,
            timeout: TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Per-call timeout (default 60s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn upload(&self, audio: &[u8], api_key: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", api_key)
            .body(audio.to_vec())
            .timeout(self.timeout)
            .send()
            .await?;
        let upload: UploadResponse = check_status(response).await?.json().await?;
        Ok(upload.upload_url)
    }

    async fn submit(&self, audio_url: &str, api_key: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", api_key)
            .json(&json!({ "audio_url": audio_url }))
            .timeout(self.timeout)
            .send()
            .await?;
        let job: TranscriptJob = check_status(response).await?.json().await?;
        Ok(job.id)
    }

    async fn check(&self, id: &str, api_key: &str) -> Result<PollStatus<String>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v2/transcript/{}", self.base_url, id))
            .header("authorization", api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        let job: TranscriptJob = check_status(response).await?.json().await?;
        job.into_status()
    }
}

// --- AssemblyAI response types ---

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptJob {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl TranscriptJob {
    fn into_status(self) -> Result<PollStatus<String>, ProviderError> {
        match self.status.as_str() {
            "completed" => Ok(PollStatus::Ready(self.text.unwrap_or_default())),
            "error" => Err(ProviderError::Rejected(
                self.error.unwrap_or_else(|| "transcription failed".into()),
            )),
            _ => Ok(PollStatus::Pending),
        }
    }
}

#[async_trait]
impl SpeechToText for AssemblyAiClient {
    async fn transcribe(&self, audio: &[u8], api_key: &str) -> Result<String, ProviderError> {
        let upload_url = self.upload(audio, api_key).await?;
        let id = self.submit(&upload_url, api_key).await?;
        debug!(job_id = %id, bytes = audio.len(), "Submitted transcription job");

        let text = poll_bounded(self.poll, |_| self.check(&id, api_key)).await?;
        Ok(text.trim().to_string())
    }
}
