//! HTTP gateway for the voice pipeline.
//!
//! Exposes the conversational turn endpoint, per-session configuration,
//! and the single-shot synthesis/transcription/query variants. Every
//! failure is answered with the same JSON envelope so the browser client
//! can show a fallback message and the failing stage.

pub mod error;
pub mod handlers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, start_gateway};
pub use state::GatewayState;
