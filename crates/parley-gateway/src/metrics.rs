//! Prometheus metrics recording and endpoint.

use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

use parley_core::error::{Stage, StageError};
use parley_core::types::PipelineResponse;

/// Install the Prometheus recorder. Returns `None` if a global recorder is
/// already installed.
pub fn install_prometheus_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// Record one conversational turn with its outcome and duration.
pub fn record_turn(elapsed: Duration, result: &Result<PipelineResponse, StageError>) {
    let outcome = match result {
        Ok(resp) if resp.fallback => "fallback",
        Ok(_) => "ok",
        Err(_) => "error",
    };
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("parley_turns_total", &labels).increment(1);
    metrics::histogram!("parley_turn_duration_seconds", &labels).record(elapsed.as_secs_f64());

    if matches!(result, Ok(resp) if resp.fallback) {
        metrics::counter!("parley_tts_fallback_total").increment(1);
    }
}

/// Record a failed request attributed to `stage`.
pub fn record_failure(stage: Stage) {
    let labels = [("stage", stage.as_str().to_string())];
    metrics::counter!("parley_stage_failures_total", &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_prometheus_recorder() {
        // Only one recorder per process; a second install reports None.
        if let Some(handle) = install_prometheus_recorder() {
            record_failure(Stage::Stt);
            assert!(handle.render().contains("parley_stage_failures_total"));
        }
    }

    #[test]
    fn test_record_turn_does_not_panic() {
        let ok = Ok(PipelineResponse::new(
            "hi".into(),
            "hello".into(),
            vec!["/static/fallback.mp3".into()],
            Vec::new(),
            true,
        ));
        record_turn(Duration::from_millis(120), &ok);
        record_turn(
            Duration::from_millis(5),
            &Err(StageError::forced(Stage::Llm)),
        );
    }
}
