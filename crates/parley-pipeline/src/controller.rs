//! Pipeline controller: sequences one conversational turn.
//!
//! Stages run strictly in order under the session's lock:
//! stage upload, transcribe, detect skill, enrich, build prompt, generate,
//! synthesize. Transcription and generation failures end the run; synthesis
//! failures degrade to the fallback asset; enrichment never fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use parley_core::config::Config;
use parley_core::error::{Stage, StageError};
use parley_core::locks::SessionLocks;
use parley_core::persona::Persona;
use parley_core::session::Role;
use parley_core::session_store::SessionStore;
use parley_core::types::{FALLBACK_AUDIO_PATH, PipelineRequest, PipelineResponse, ProviderKind};
use parley_providers::assemblyai::AssemblyAiClient;
use parley_providers::gemini::GeminiClient;
use parley_providers::murf::MurfClient;
use parley_providers::openweather::OpenWeatherClient;
use parley_providers::tavily::TavilyClient;
use parley_providers::{LanguageModel, SpeechSynthesis, SpeechToText, WeatherLookup, WebSearch};

use crate::chunker::{chunk_text, synthesize_chunks};
use crate::credentials::Credentials;
use crate::enrich::Enricher;
use crate::prompt::{PromptBuilder, concise_utterance, shorten_reply};
use crate::skills::detect_with_default_city;
use crate::staging::StagedAudio;

/// The external services a pipeline talks to.
#[derive(Clone)]
pub struct Providers {
    pub stt: Arc<dyn SpeechToText>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn SpeechSynthesis>,
    pub weather: Arc<dyn WeatherLookup>,
    pub search: Arc<dyn WebSearch>,
}

impl Providers {
    /// Real HTTP clients configured from `config`.
    pub fn from_config(config: &Config) -> Self {
        let pipeline = config.pipeline();
        let model = config.llm_model();
        Self {
            stt: Arc::new(AssemblyAiClient::new(
                config.base_url(ProviderKind::Stt),
                pipeline.stt_poll.into(),
            )),
            llm: Arc::new(GeminiClient::new(
                config.base_url(ProviderKind::Llm),
                Some(&model),
            )),
            tts: Arc::new(MurfClient::new(
                config.base_url(ProviderKind::Tts),
                pipeline.tts_poll.into(),
            )),
            weather: Arc::new(OpenWeatherClient::new(config.base_url(ProviderKind::Weather))),
            search: Arc::new(TavilyClient::new(config.base_url(ProviderKind::Search))),
        }
    }
}

/// What a synthesis failure does to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsFailurePolicy {
    /// Succeed with the fallback asset and `fallback = true`.
    Degrade,
    /// Fail the request with a `tts` stage error.
    Fail,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub prompt_turns: usize,
    pub tts_chunk_chars: usize,
    pub concise_reply_chars: usize,
    /// Budget for the stages of one run, excluding time spent waiting for
    /// the session lock. `None` disables it.
    pub deadline: Option<Duration>,
    pub stage_audio_dir: Option<PathBuf>,
    pub default_city: String,
    /// Honour `PipelineRequest::forced_failure`.
    pub allow_forced_failures: bool,
    /// Replaces the persona voice when set.
    pub voice_override: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let pipeline = config.pipeline();
        Self {
            prompt_turns: pipeline.prompt_turns,
            tts_chunk_chars: pipeline.tts_chunk_chars,
            concise_reply_chars: pipeline.concise_reply_chars,
            deadline: pipeline.deadline(),
            stage_audio_dir: pipeline.stage_audio_dir(),
            default_city: pipeline.default_city.clone(),
            allow_forced_failures: config.allow_forced_failures(),
            voice_override: config.tts_voice().map(String::from),
        }
    }
}

pub struct Pipeline {
    pub(crate) providers: Providers,
    enricher: Enricher,
    sessions: Arc<SessionStore>,
    locks: Arc<SessionLocks>,
    pub(crate) credentials: Credentials,
    pub(crate) settings: PipelineSettings,
    pub(crate) prompt: PromptBuilder,
}

impl Pipeline {
    pub fn new(
        providers: Providers,
        sessions: Arc<SessionStore>,
        locks: Arc<SessionLocks>,
        credentials: Credentials,
        settings: PipelineSettings,
    ) -> Self {
        let enricher = Enricher::new(providers.weather.clone(), providers.search.clone());
        let prompt = PromptBuilder::new(settings.prompt_turns);
        Self {
            providers,
            enricher,
            sessions,
            locks,
            credentials,
            settings,
            prompt,
        }
    }

    /// Pipeline wired to the real providers and the server-wide keys.
    pub fn from_config(config: &Config, sessions: Arc<SessionStore>, locks: Arc<SessionLocks>) -> Self {
        Self::new(
            Providers::from_config(config),
            sessions,
            locks,
            Credentials::from_config(config),
            PipelineSettings::from_config(config),
        )
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Return the forced failure for `requested`, if the gate is open.
    pub(crate) fn forced_failure(&self, requested: Option<Stage>) -> Result<(), StageError> {
        match requested {
            Some(stage) if self.settings.allow_forced_failures => {
                warn!(%stage, "Forced failure requested");
                Err(StageError::forced(stage))
            }
            Some(stage) => {
                debug!(%stage, "Ignoring forced failure: not enabled");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Run one conversational turn for `request.session_id`.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineResponse, StageError> {
        self.forced_failure(request.forced_failure)?;

        let session_id = request.session_id.clone();
        let guard = self.locks.acquire(&session_id).await;
        let started = Instant::now();

        let result = match self.settings.deadline {
            Some(limit) => tokio::time::timeout(limit, self.run_stages(request))
                .await
                .unwrap_or_else(|_| {
                    Err(StageError::timeout(
                        Stage::Agent,
                        format!("Pipeline exceeded {}s deadline", limit.as_secs()),
                    ))
                }),
            None => self.run_stages(request).await,
        };
        guard.release();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => info!(
                session_id = %session_id,
                chunks = response.audio_urls.len(),
                fallback = response.fallback,
                elapsed_ms,
                "Pipeline turn complete"
            ),
            Err(e) => warn!(
                session_id = %session_id,
                stage = %e.stage,
                status = e.http_status,
                elapsed_ms,
                error = %e.detail,
                "Pipeline turn failed"
            ),
        }
        result
    }

    async fn run_stages(&self, request: PipelineRequest) -> Result<PipelineResponse, StageError> {
        let PipelineRequest {
            session_id,
            audio,
            flags,
            ..
        } = request;
        let id = session_id.as_str();

        // 1. Spool the upload; the guard removes it on every exit path
        let (_staged, audio) = self.stage_upload(audio).await?;
        if audio.is_empty() {
            return Err(StageError::bad_request(Stage::Stt, "Empty audio upload"));
        }

        // 2. Resolve credentials before any provider call
        let session_config = self.sessions.config(id).await;
        let creds = self.credentials.overlay(&session_config);
        let stt_key = creds.require(ProviderKind::Stt)?;
        let llm_key = creds.require(ProviderKind::Llm)?;

        // 3. Transcribe
        let transcript = self.transcribe(&audio, stt_key).await?;
        debug!(session_id = id, chars = transcript.len(), "Transcribed");

        // 4. Skill detection, strictly before enrichment
        let marker = detect_with_default_city(&transcript, &self.settings.default_city);
        debug!(session_id = id, skill = marker.kind(), "Detected skill");

        // 5. Enrichment
        let enrichment = self.enricher.enrich(&marker, &transcript, flags, &creds).await;
        let mut utterance = enrichment.apply(&transcript);
        if flags.concise {
            utterance = concise_utterance(&utterance);
        }

        // 6. Prompt from prior history, then record the user turn
        let persona = Persona::resolve(&session_config.persona);
        let history = self.sessions.history(id).await;
        let generation = self.prompt.build(persona, &history, &utterance);
        self.sessions.append(id, Role::User, transcript.as_str()).await;

        // 7. Generate
        let reply = self
            .providers
            .llm
            .generate(&generation, llm_key)
            .await
            .map_err(|e| e.into_stage_error(Stage::Llm))?;
        let reply = if flags.concise {
            shorten_reply(&reply, self.settings.concise_reply_chars)
        } else {
            reply.trim().to_string()
        };
        self.sessions.append(id, Role::Assistant, reply.as_str()).await;

        // 8. Synthesize the final reply
        let voice = self.voice_for(persona);
        let (audio_urls, fallback) = self
            .synthesize_reply(
                &reply,
                voice,
                creds.get(ProviderKind::Tts),
                TtsFailurePolicy::Degrade,
            )
            .await?;

        let history = self.sessions.history(id).await;
        Ok(PipelineResponse::new(
            transcript, reply, audio_urls, history, fallback,
        ))
    }

    pub(crate) async fn stage_upload(
        &self,
        audio: Vec<u8>,
    ) -> Result<(Option<StagedAudio>, Vec<u8>), StageError> {
        match &self.settings.stage_audio_dir {
            Some(dir) => {
                let (staged, audio) = StagedAudio::stage(dir.clone(), audio)
                    .await
                    .map_err(|e| StageError::internal(format!("Failed to stage audio: {e}")))?;
                Ok((Some(staged), audio))
            }
            None => Ok((None, audio)),
        }
    }

    /// Transcribe, treating an empty transcript as an `stt` timeout.
    pub(crate) async fn transcribe(&self, audio: &[u8], key: &str) -> Result<String, StageError> {
        let transcript = self
            .providers
            .stt
            .transcribe(audio, key)
            .await
            .map_err(|e| e.into_stage_error(Stage::Stt))?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(StageError::timeout(
                Stage::Stt,
                "Transcription timed out or empty",
            ));
        }
        Ok(transcript.to_string())
    }

    pub(crate) fn voice_for<'a>(&'a self, persona: &'a Persona) -> &'a str {
        self.settings
            .voice_override
            .as_deref()
            .unwrap_or(persona.voice_id)
    }

    /// Chunk and synthesize `text`. Returns the audio URLs and whether the
    /// fallback asset was substituted.
    pub(crate) async fn synthesize_reply(
        &self,
        text: &str,
        voice_id: &str,
        key: Option<&str>,
        policy: TtsFailurePolicy,
    ) -> Result<(Vec<String>, bool), StageError> {
        let degrade = |reason: String| -> Result<(Vec<String>, bool), StageError> {
            match policy {
                TtsFailurePolicy::Degrade => {
                    warn!(reason = %reason, "Speech synthesis degraded to fallback audio");
                    Ok((vec![FALLBACK_AUDIO_PATH.to_string()], true))
                }
                TtsFailurePolicy::Fail => Err(StageError::upstream(Stage::Tts, reason)),
            }
        };

        let Some(key) = key else {
            return match policy {
                TtsFailurePolicy::Fail => Err(StageError::config("Missing murf API key")),
                TtsFailurePolicy::Degrade => degrade("no speech synthesis key".into()),
            };
        };

        let budget = self
            .settings
            .tts_chunk_chars
            .min(self.providers.tts.max_chars());
        let chunks = chunk_text(text, budget);
        if chunks.is_empty() {
            return degrade("nothing to synthesize".into());
        }

        match synthesize_chunks(self.providers.tts.as_ref(), &chunks, voice_id, key).await {
            Ok(urls) => Ok((urls, false)),
            Err(e) => match policy {
                TtsFailurePolicy::Fail => Err(e.into_stage_error(Stage::Tts)),
                TtsFailurePolicy::Degrade => degrade(e.to_string()),
            },
        }
    }
}
