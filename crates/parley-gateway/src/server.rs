//! Axum-based HTTP server.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::state::GatewayState;

/// Largest accepted request body (audio uploads).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the API router. The embedded UI is merged separately by
/// [`start_gateway`].
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/agent/chat/{session_id}", post(handlers::chat))
        .route("/config/{session_id}", post(handlers::update_config))
        .route("/generate-audio", post(handlers::generate_audio))
        .route("/transcribe/file", post(handlers::transcribe_file))
        .route("/tts/echo", post(handlers::tts_echo))
        .route("/llm/query", post(handlers::llm_query));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(handlers::metrics));

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
    )
}

/// Start the gateway HTTP server.
///
/// Static assets (including the fallback audio) are always served; the
/// voice UI page at `/` only when `ui_enabled` is true.
pub async fn start_gateway(
    state: Arc<GatewayState>,
    port: u16,
    ui_enabled: bool,
) -> anyhow::Result<()> {
    let bind_addr = state.config.gateway_bind();

    let assets = if ui_enabled {
        info!("Voice UI available at http://{bind_addr}:{port}/");
        parley_web::ui_router()
    } else {
        parley_web::static_router()
    };
    let app = build_router(state)
        .merge(assets)
        .fallback(handlers::not_found);

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
