//! Single-shot variants without persona, skills or history.
//!
//! These use the server-wide credentials only and treat speech synthesis
//! failure as fatal.

use serde::{Deserialize, Serialize};
use tracing::info;

use parley_core::error::{Stage, StageError};
use parley_core::persona::{DEFAULT_PERSONA, Persona};
use parley_core::types::ProviderKind;

use crate::controller::{Pipeline, TtsFailurePolicy};

/// Input to [`Pipeline::query`].
#[derive(Debug, Clone)]
pub enum QueryInput {
    Audio(Vec<u8>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub audio_url: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub audio_url: String,
    pub audio_urls: Vec<String>,
    /// Transcript, present when the input was audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub llm_text: String,
}

impl Pipeline {
    fn default_voice(&self) -> &str {
        self.voice_for(Persona::resolve(DEFAULT_PERSONA))
    }

    /// Text to a single audio URL.
    pub async fn synthesize_text(
        &self,
        text: &str,
        forced: Option<Stage>,
    ) -> Result<String, StageError> {
        self.forced_failure(forced)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(StageError::bad_request(Stage::Tts, "No text provided"));
        }
        let key = self.credentials.require(ProviderKind::Tts)?;
        self.providers
            .tts
            .synthesize(text, self.default_voice(), key)
            .await
            .map_err(|e| e.into_stage_error(Stage::Tts))
    }

    /// Audio to transcript.
    pub async fn transcribe_only(
        &self,
        audio: Vec<u8>,
        forced: Option<Stage>,
    ) -> Result<String, StageError> {
        self.forced_failure(forced)?;
        let (_staged, audio) = self.stage_upload(audio).await?;
        if audio.is_empty() {
            return Err(StageError::bad_request(Stage::Stt, "Empty audio upload"));
        }
        let key = self.credentials.require(ProviderKind::Stt)?;
        self.transcribe(&audio, key).await
    }

    /// Transcribe the upload and read the transcript back.
    pub async fn echo(
        &self,
        audio: Vec<u8>,
        forced: Option<Stage>,
    ) -> Result<EchoResponse, StageError> {
        self.forced_failure(forced)?;
        let (_staged, audio) = self.stage_upload(audio).await?;
        if audio.is_empty() {
            return Err(StageError::bad_request(Stage::Stt, "Empty audio upload"));
        }
        let stt_key = self.credentials.require(ProviderKind::Stt)?;
        let tts_key = self.credentials.require(ProviderKind::Tts)?;

        let text = self.transcribe(&audio, stt_key).await?;
        let audio_url = self
            .providers
            .tts
            .synthesize(&text, self.default_voice(), tts_key)
            .await
            .map_err(|e| e.into_stage_error(Stage::Tts))?;
        Ok(EchoResponse { audio_url, text })
    }

    /// One stateless question: optional transcription, generation with the
    /// neutral persona, then chunked synthesis.
    pub async fn query(
        &self,
        input: QueryInput,
        forced: Option<Stage>,
    ) -> Result<QueryResponse, StageError> {
        self.forced_failure(forced)?;
        let llm_key = self.credentials.require(ProviderKind::Llm)?;

        let (question, transcript) = match input {
            QueryInput::Text(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(StageError::bad_request(Stage::Llm, "No text provided"));
                }
                (text, None)
            }
            QueryInput::Audio(audio) => {
                let (_staged, audio) = self.stage_upload(audio).await?;
                if audio.is_empty() {
                    return Err(StageError::bad_request(Stage::Stt, "Empty audio upload"));
                }
                let stt_key = self.credentials.require(ProviderKind::Stt)?;
                let text = self.transcribe(&audio, stt_key).await?;
                (text.clone(), Some(text))
            }
        };

        let persona = Persona::resolve(DEFAULT_PERSONA);
        let generation = self.prompt.build(persona, &[], &question);
        let llm_text = self
            .providers
            .llm
            .generate(&generation, llm_key)
            .await
            .map_err(|e| e.into_stage_error(Stage::Llm))?
            .trim()
            .to_string();

        let (audio_urls, _) = self
            .synthesize_reply(
                &llm_text,
                self.voice_for(persona),
                self.credentials.get(ProviderKind::Tts),
                TtsFailurePolicy::Fail,
            )
            .await?;
        info!(chunks = audio_urls.len(), "Answered single-shot query");

        Ok(QueryResponse {
            audio_url: audio_urls.first().cloned().unwrap_or_default(),
            audio_urls,
            text: transcript,
            llm_text,
        })
    }
}
