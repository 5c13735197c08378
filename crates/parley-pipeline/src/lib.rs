//! Voice pipeline: speech in, spoken reply out.
//!
//! [`Pipeline::run`] takes an uploaded utterance through transcription,
//! inline skill detection, optional weather/search enrichment, prompt
//! assembly from the session's bounded history, generation, and chunked
//! speech synthesis. Runs for the same session are serialized; runs for
//! different sessions proceed concurrently.

pub mod arithmetic;
pub mod chunker;
pub mod controller;
pub mod credentials;
pub mod enrich;
pub mod legacy;
pub mod prompt;
pub mod skills;
pub mod staging;

pub use controller::{Pipeline, PipelineSettings, Providers, TtsFailurePolicy};
pub use credentials::Credentials;
pub use legacy::{EchoResponse, QueryInput, QueryResponse};
pub use skills::{SkillMarker, detect};
