//! Provider client tests against fake upstream servers.
//!
//! Each test stands up a small axum app on a free local port that mimics the
//! relevant slice of the real API, then points the client at it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use parley_core::error::Stage;
use parley_core::session::{ChatTurn, Role};
use parley_providers::assemblyai::AssemblyAiClient;
use parley_providers::gemini::GeminiClient;
use parley_providers::murf::MurfClient;
use parley_providers::openweather::OpenWeatherClient;
use parley_providers::tavily::TavilyClient;
use parley_providers::{
    GenerationRequest, LanguageModel, PollPolicy, ProviderError, SpeechSynthesis, SpeechToText,
    WeatherLookup, WebSearch,
};

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn fast_poll(max_attempts: u32) -> PollPolicy {
    PollPolicy::new(max_attempts, Duration::from_millis(5))
}

// --- AssemblyAI ---

#[derive(Clone)]
struct SttState {
    polls: Arc<AtomicU32>,
    ready_after: u32,
}

fn fake_assemblyai(ready_after: u32) -> (Router, Arc<AtomicU32>) {
    let polls = Arc::new(AtomicU32::new(0));
    let state = SttState {
        polls: polls.clone(),
        ready_after,
    };
    let app = Router::new()
        .route(
            "/v2/upload",
            post(|headers: HeaderMap| async move {
                if headers.get("authorization").is_none() {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "no key"})));
                }
                (
                    StatusCode::OK,
                    Json(json!({"upload_url": "https://cdn.example/upload/1"})),
                )
            }),
        )
        .route(
            "/v2/transcript",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["audio_url"], "https://cdn.example/upload/1");
                Json(json!({"id": "t-1", "status": "queued"}))
            }),
        )
        .route(
            "/v2/transcript/{id}",
            get(|State(state): State<SttState>, Path(id): Path<String>| async move {
                let n = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= state.ready_after {
                    Json(json!({"id": id, "status": "completed", "text": " hello world "}))
                } else {
                    Json(json!({"id": id, "status": "processing"}))
                }
            }),
        )
        .with_state(state);
    (app, polls)
}

#[tokio::test]
async fn test_assemblyai_upload_submit_poll() {
    let (app, polls) = fake_assemblyai(3);
    let base = serve(app).await;
    let client = AssemblyAiClient::new(Some(&base), fast_poll(10));

    let text = client.transcribe(b"RIFF....", "aai-key").await.unwrap();
    assert_eq!(text, "hello world");
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_assemblyai_poll_exhaustion() {
    let (app, polls) = fake_assemblyai(u32::MAX);
    let base = serve(app).await;
    let client = AssemblyAiClient::new(Some(&base), fast_poll(4));

    let err = client.transcribe(b"RIFF....", "aai-key").await.unwrap_err();
    assert!(matches!(err, ProviderError::PollExhausted { attempts: 4 }));
    assert_eq!(polls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_assemblyai_job_error() {
    let app = Router::new()
        .route(
            "/v2/upload",
            post(|| async { Json(json!({"upload_url": "u"})) }),
        )
        .route(
            "/v2/transcript",
            post(|| async { Json(json!({"id": "t-2", "status": "queued"})) }),
        )
        .route(
            "/v2/transcript/{id}",
            get(|| async {
                Json(json!({"id": "t-2", "status": "error", "error": "Audio too short"}))
            }),
        );
    let base = serve(app).await;
    let client = AssemblyAiClient::new(Some(&base), fast_poll(5));

    let err = client.transcribe(b"x", "k").await.unwrap_err();
    assert!(matches!(err, ProviderError::Rejected(ref m) if m == "Audio too short"));
}

// --- Gemini ---

#[tokio::test]
async fn test_gemini_generate() {
    let app = Router::new().route(
        "/v1beta/models/{call}",
        post(
            |Path(call): Path<String>,
             Query(q): Query<HashMap<String, String>>,
             headers: HeaderMap,
             Json(body): Json<Value>| async move {
                assert_eq!(call, "gemini-1.5-flash:generateContent");
                assert!(q.get("key").is_none());
                assert_eq!(
                    headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()),
                    Some("gem-key")
                );
                let prompt = body["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                assert!(prompt.ends_with("Assistant:"));
                assert!(prompt.contains("User: earlier"));
                Json(json!({
                    "candidates": [{"content": {"parts": [{"text": "Sure thing."}]}}]
                }))
            },
        ),
    );
    let base = serve(app).await;
    let client = GeminiClient::new(Some(&base), None);

    let request = GenerationRequest::new(
        "Be brief.",
        vec![
            ChatTurn::new(Role::User, "earlier"),
            ChatTurn::new(Role::Assistant, "reply"),
        ],
        "now",
    );
    let reply = client.generate(&request, "gem-key").await.unwrap();
    assert_eq!(reply, "Sure thing.");
}

#[tokio::test]
async fn test_gemini_empty_and_error_status() {
    let app = Router::new()
        .route(
            "/v1beta/models/{call}",
            post(|Path(call): Path<String>| async move {
                if call.starts_with("broken") {
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})))
                } else {
                    (StatusCode::OK, Json(json!({"candidates": []})))
                }
            }),
        );
    let base = serve(app).await;
    let request = GenerationRequest::new("s", vec![], "u");

    let empty = GeminiClient::new(Some(&base), Some("gemini-1.5-flash"));
    let err = empty.generate(&request, "k").await.unwrap_err();
    assert!(matches!(err, ProviderError::Empty(_)));

    let broken = GeminiClient::new(Some(&base), Some("broken-model"));
    let err = broken.generate(&request, "k").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 500, .. }));
}

// --- Murf ---

#[tokio::test]
async fn test_murf_direct_url() {
    let app = Router::new().route(
        "/v1/speech/generate",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("api-key").and_then(|v| v.to_str().ok()),
                Some("murf-key")
            );
            assert_eq!(body["voice_id"], "en-US-ken");
            assert_eq!(body["format"], "mp3");
            Json(json!({"audioFile": "https://murf.example/a.mp3"}))
        }),
    );
    let base = serve(app).await;
    let client = MurfClient::new(Some(&base), fast_poll(3));

    let url = client.synthesize("Ahoy", "en-US-ken", "murf-key").await.unwrap();
    assert_eq!(url, "https://murf.example/a.mp3");
}

#[tokio::test]
async fn test_murf_polls_job() {
    let polls = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route(
            "/v1/speech/generate",
            post(|| async { Json(json!({"id": "job-9"})) }),
        )
        .route(
            "/v1/speech/{id}",
            get(|State(polls): State<Arc<AtomicU32>>| async move {
                if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Json(json!({"id": "job-9"}))
                } else {
                    Json(json!({"audioFile": {"url": "https://murf.example/job-9.mp3"}}))
                }
            }),
        )
        .with_state(polls.clone());
    let base = serve(app).await;
    let client = MurfClient::new(Some(&base), fast_poll(5));

    let url = client.synthesize("hello", "en-US-natalie", "k").await.unwrap();
    assert_eq!(url, "https://murf.example/job-9.mp3");
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_murf_rejects_upstream_failure() {
    let app = Router::new().route(
        "/v1/speech/generate",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    );
    let base = serve(app).await;
    let client = MurfClient::new(Some(&base), fast_poll(2));

    let err = client.synthesize("hello", "v", "k").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 503, ref body } if body == "down"));
}

// --- OpenWeatherMap ---

fn fake_weather() -> Router {
    Router::new().route(
        "/data/2.5/weather",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            if q.get("appid").map(String::as_str) != Some("good") {
                return (StatusCode::UNAUTHORIZED, Json(json!({"cod": 401})));
            }
            assert_eq!(q.get("units").map(String::as_str), Some("metric"));
            match q.get("q").map(String::as_str) {
                Some("Paris") => (
                    StatusCode::OK,
                    Json(json!({
                        "cod": 200,
                        "weather": [{"description": "clear sky"}],
                        "main": {"temp": 21.0, "feels_like": 20.5, "humidity": 40}
                    })),
                ),
                _ => (
                    StatusCode::NOT_FOUND,
                    Json(json!({"cod": "404", "message": "city not found"})),
                ),
            }
        }),
    )
}

#[tokio::test]
async fn test_weather_summary_and_errors() {
    let base = serve(fake_weather()).await;
    let client = OpenWeatherClient::new(Some(&base));

    let summary = client.current("Paris", "good").await.unwrap();
    assert!(summary.starts_with("Current weather in Paris: Clear sky"));
    assert!(summary.contains("Humidity: 40%"));

    let err = client.current("Paris", "bad").await.unwrap_err();
    assert!(matches!(err, ProviderError::Unauthorized));

    let err = client.current("Atlantis", "good").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 404, .. }));
}

// --- Tavily ---

#[tokio::test]
async fn test_tavily_search() {
    let app = Router::new().route(
        "/search",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["include_answer"], true);
            assert_eq!(body["max_results"], 3);
            if body["query"] == "nothing" {
                return Json(json!({"results": []}));
            }
            Json(json!({
                "answer": "Rust 1.85",
                "results": [{"title": "Release notes", "content": "Rust 1.85 shipped."}]
            }))
        }),
    );
    let base = serve(app).await;
    let client = TavilyClient::new(Some(&base));

    let digest = client.search("latest rust", "tv-key").await.unwrap();
    assert!(digest.starts_with("Quick Answer: Rust 1.85"));
    assert!(digest.contains("Release notes: Rust 1.85 shipped...."));

    let none = client.search("nothing", "tv-key").await.unwrap();
    assert_eq!(none, "No search results found for: nothing");
}

// --- Transport failures ---

/// A server that accepts requests and never answers.
async fn serve_hanging() -> String {
    let app = Router::new().fallback(|| async {
        std::future::pending::<()>().await;
        StatusCode::OK
    });
    serve(app).await
}

/// A local address with nothing listening on it.
fn dead_base() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn test_transport_error_never_carries_api_key() {
    let base = dead_base();
    let request = GenerationRequest::new("s", vec![], "u");

    let err = GeminiClient::new(Some(&base), None)
        .generate(&request, "SUPERSECRET-GEMINI")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
    let stage_err = err.into_stage_error(Stage::Llm);
    assert_eq!(stage_err.http_status, 502);
    assert!(!stage_err.detail.contains("SUPERSECRET"));

    let err = OpenWeatherClient::new(Some(&base))
        .current("Paris", "SUPERSECRET-WEATHER")
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("SUPERSECRET"));
    assert!(!format!("{err:?}").contains("SUPERSECRET"));
}

#[tokio::test]
async fn test_hung_gemini_times_out() {
    let base = serve_hanging().await;
    let client = GeminiClient::new(Some(&base), None).with_timeout(Duration::from_millis(100));
    let request = GenerationRequest::new("s", vec![], "u");

    let err = client.generate(&request, "gem-key").await.unwrap_err();
    let stage_err = err.into_stage_error(Stage::Llm);
    assert_eq!(stage_err.stage, Stage::Llm);
    assert_eq!(stage_err.http_status, 504);
    assert!(!stage_err.detail.contains("gem-key"));
}

#[tokio::test]
async fn test_hung_assemblyai_and_murf_time_out() {
    let base = serve_hanging().await;

    let stt = AssemblyAiClient::new(Some(&base), fast_poll(3))
        .with_timeout(Duration::from_millis(100));
    let err = stt.transcribe(b"x", "aai-key").await.unwrap_err();
    assert_eq!(err.into_stage_error(Stage::Stt).http_status, 504);

    let tts = MurfClient::new(Some(&base), fast_poll(3)).with_timeout(Duration::from_millis(100));
    let err = tts.synthesize("hello", "en-US-ken", "murf-key").await.unwrap_err();
    assert_eq!(err.into_stage_error(Stage::Tts).http_status, 504);
}
