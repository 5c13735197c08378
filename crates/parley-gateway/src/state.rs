//! Gateway shared state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use parley_core::config::Config;
use parley_core::locks::SessionLocks;
use parley_core::session_store::SessionStore;
use parley_pipeline::Pipeline;

/// Shared gateway state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub started_at: DateTime<Utc>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            pipeline,
            started_at: Utc::now(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Build the pipeline with the real provider clients described by `config`.
    pub fn from_config(config: Config) -> Self {
        let sessions = Arc::new(SessionStore::new(config.pipeline().max_turns));
        let locks = Arc::new(SessionLocks::new());
        let pipeline = Arc::new(Pipeline::from_config(&config, sessions, locks));
        Self::new(Arc::new(config), pipeline)
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.pipeline.sessions()
    }

    /// Whether the `x-debug-fail` header is honoured at all.
    pub fn forced_failures_enabled(&self) -> bool {
        self.config.allow_forced_failures()
    }
}
