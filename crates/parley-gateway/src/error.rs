//! Failure envelope returned by every endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, warn};

use parley_core::error::{FALLBACK_TEXT, Stage, StageError};

/// A [`StageError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub StageError);

/// `{ ok: false, stage, error, fallback_text }`
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    stage: Stage,
    error: &'a str,
    fallback_text: &'static str,
}

impl ApiError {
    /// Malformed request that never reached a provider.
    pub fn bad_request(stage: Stage, detail: impl Into<String>) -> Self {
        Self(StageError::bad_request(stage, detail))
    }
}

impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(stage = %self.0.stage, status = status.as_u16(), error = %self.0.detail, "Request failed");
        } else {
            debug!(stage = %self.0.stage, status = status.as_u16(), error = %self.0.detail, "Request rejected");
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record_failure(self.0.stage);

        let body = ErrorBody {
            ok: false,
            stage: self.0.stage,
            error: &self.0.detail,
            fallback_text: FALLBACK_TEXT,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_stage_error() {
        let resp = ApiError(StageError::timeout(Stage::Stt, "slow")).into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

        let resp = ApiError(StageError::config("Missing aai API key")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = ApiError::bad_request(Stage::Tts, "No text provided").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_envelope_shape() {
        let body = ErrorBody {
            ok: false,
            stage: Stage::Llm,
            error: "boom",
            fallback_text: FALLBACK_TEXT,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["stage"], "llm");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["fallback_text"], FALLBACK_TEXT);
    }
}
