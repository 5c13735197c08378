//! Route handlers.
//!
//! Handlers only translate HTTP into pipeline calls: multipart/JSON
//! parsing, the `x-debug-fail` gate, and response shaping. All stage
//! semantics live in `parley_pipeline`.

use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::time::Instant;

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use parley_core::error::Stage;
use parley_core::session::ConfigUpdate;
use parley_core::types::{PipelineRequest, PipelineResponse, TurnFlags};
use parley_pipeline::{EchoResponse, QueryInput, QueryResponse};

use crate::error::ApiError;
use crate::state::GatewayState;

/// Request header naming a stage to fail deterministically.
pub const DEBUG_FAIL_HEADER: &str = "x-debug-fail";

pub const CHAT_FORCEABLE: &[Stage] = &[Stage::Agent, Stage::Stt, Stage::Llm, Stage::Tts];
pub const GENERATE_FORCEABLE: &[Stage] = &[Stage::Tts];
pub const TRANSCRIBE_FORCEABLE: &[Stage] = &[Stage::Stt];
pub const ECHO_FORCEABLE: &[Stage] = &[Stage::Stt, Stage::Tts];
pub const QUERY_FORCEABLE: &[Stage] = &[Stage::Llm];

type Shared = State<Arc<GatewayState>>;

/// Read the debug failure header, honouring it only when the gateway was
/// configured to allow it and the stage is valid for the endpoint.
pub fn forced_stage(state: &GatewayState, headers: &HeaderMap, allowed: &[Stage]) -> Option<Stage> {
    let raw = headers.get(DEBUG_FAIL_HEADER)?.to_str().ok()?;
    if !state.forced_failures_enabled() {
        debug!(value = raw, "Forced failures disabled; ignoring header");
        return None;
    }
    match Stage::parse(raw) {
        Some(stage) if allowed.contains(&stage) => Some(stage),
        _ => {
            debug!(value = raw, "Stage not forceable on this endpoint");
            None
        }
    }
}

// --- Multipart uploads ---

#[derive(Debug, Default)]
struct Upload {
    audio: Option<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl Upload {
    /// Parse every part. The audio part may be named `file` or `audio`.
    async fn read(mut multipart: Multipart, stage: Stage) -> Result<Self, ApiError> {
        let mut upload = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(stage, format!("Malformed upload: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" || name == "audio" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(stage, format!("Malformed upload: {e}")))?;
                upload.audio = Some(bytes.to_vec());
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(stage, format!("Malformed field {name}: {e}")))?;
                upload.fields.insert(name, text);
            }
        }
        Ok(upload)
    }

    fn require_audio(&mut self, stage: Stage) -> Result<Vec<u8>, ApiError> {
        self.audio
            .take()
            .ok_or_else(|| ApiError::bad_request(stage, "No audio file uploaded"))
    }

    /// True when any of `names` carries a truthy value.
    fn flag(&self, names: &[&str]) -> bool {
        names.iter().any(|name| {
            self.fields.get(*name).is_some_and(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "true" | "1" | "on" | "yes"
                )
            })
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub text: String,
}

fn json_rejection(stage: Stage, rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(stage, rejection.body_text())
}

// --- Conversational turn ---

pub async fn chat(
    State(state): Shared,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<PipelineResponse>, ApiError> {
    let mut upload = Upload::read(multipart, Stage::Stt).await?;
    let audio = upload.require_audio(Stage::Stt)?;
    let flags = TurnFlags {
        perform_web_search: upload.flag(&["web_search", "performWebSearch"]),
        concise: upload.flag(&["concise"]),
    };

    let mut request = PipelineRequest::new(session_id, audio, flags);
    if let Some(stage) = forced_stage(&state, &headers, CHAT_FORCEABLE) {
        request = request.with_forced_failure(stage);
    }

    #[cfg(feature = "metrics")]
    let started = Instant::now();
    let result = state.pipeline.run(request).await;
    #[cfg(feature = "metrics")]
    crate::metrics::record_turn(started.elapsed(), &result);

    Ok(Json(result?))
}

pub async fn update_config(
    State(state): Shared,
    Path(session_id): Path<String>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(update) = body.map_err(|e| json_rejection(Stage::Config, e))?;
    let config = state.sessions().apply_config(&session_id, &update).await;

    let mut configured: Vec<String> = config
        .credentials
        .keys()
        .map(|kind| kind.to_string())
        .collect();
    configured.sort();

    Ok(Json(json!({
        "ok": true,
        "persona": config.persona,
        "configured": configured,
    })))
}

// --- Single-shot variants ---

pub async fn generate_audio(
    State(state): Shared,
    headers: HeaderMap,
    body: Result<Json<TextBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| json_rejection(Stage::Tts, e))?;
    let forced = forced_stage(&state, &headers, GENERATE_FORCEABLE);
    let audio_url = state.pipeline.synthesize_text(&body.text, forced).await?;
    Ok(Json(json!({ "audio_url": audio_url })))
}

pub async fn transcribe_file(
    State(state): Shared,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let audio = Upload::read(multipart, Stage::Stt)
        .await?
        .require_audio(Stage::Stt)?;
    let forced = forced_stage(&state, &headers, TRANSCRIBE_FORCEABLE);
    let transcript = state.pipeline.transcribe_only(audio, forced).await?;
    Ok(Json(json!({ "transcript": transcript })))
}

pub async fn tts_echo(
    State(state): Shared,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<EchoResponse>, ApiError> {
    let audio = Upload::read(multipart, Stage::Stt)
        .await?
        .require_audio(Stage::Stt)?;
    let forced = forced_stage(&state, &headers, ECHO_FORCEABLE);
    Ok(Json(state.pipeline.echo(audio, forced).await?))
}

/// Accepts either a multipart audio upload or a JSON `{text}` body.
pub async fn llm_query(
    State(state): Shared,
    request: Request,
) -> Result<Json<QueryResponse>, ApiError> {
    let forced = forced_stage(&state, request.headers(), QUERY_FORCEABLE);
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let input = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(Stage::Stt, e.body_text()))?;
        let audio = Upload::read(multipart, Stage::Stt)
            .await?
            .require_audio(Stage::Stt)?;
        QueryInput::Audio(audio)
    } else {
        let Json(body) = Json::<TextBody>::from_request(request, &state)
            .await
            .map_err(|e| json_rejection(Stage::Llm, e))?;
        QueryInput::Text(body.text)
    };

    Ok(Json(state.pipeline.query(input, forced).await?))
}

// --- Operational ---

pub async fn health(State(state): Shared) -> Json<Value> {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions().len().await,
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime.num_seconds(),
    }))
}

#[cfg(feature = "metrics")]
pub async fn metrics(State(state): Shared) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": "Not found" })),
    )
        .into_response()
}
