//! Enrichment stage: live weather and web-search context.
//!
//! Neither lookup can fail the pipeline. A missing key or a provider error is
//! replaced by an explanatory sentence that the model sees in place of the
//! data.

use std::sync::Arc;

use parley_core::types::{ProviderKind, TurnFlags};
use parley_providers::{ProviderError, WeatherLookup, WebSearch};
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::skills::{CALCULATOR_APOLOGY, SkillMarker};

/// Context gathered for one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    /// Calculator or weather result.
    pub skill: Option<String>,
    /// Web-search digest or explanation.
    pub search: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.skill.is_none() && self.search.is_none()
    }

    /// The utterance followed by the skill block, then the search block.
    pub fn apply(&self, utterance: &str) -> String {
        let mut out = utterance.trim().to_string();
        for block in [&self.skill, &self.search].into_iter().flatten() {
            out.push_str("\n\n");
            out.push_str(block);
        }
        out
    }
}

pub struct Enricher {
    weather: Arc<dyn WeatherLookup>,
    search: Arc<dyn WebSearch>,
}

impl Enricher {
    pub fn new(weather: Arc<dyn WeatherLookup>, search: Arc<dyn WebSearch>) -> Self {
        Self { weather, search }
    }

    /// Resolve the skill marker and optional search into prompt context.
    pub async fn enrich(
        &self,
        marker: &SkillMarker,
        transcript: &str,
        flags: TurnFlags,
        creds: &Credentials,
    ) -> Enrichment {
        let skill = async {
            match marker {
                SkillMarker::None => None,
                SkillMarker::CalculatorResult(text) if text == CALCULATOR_APOLOGY => {
                    Some(text.clone())
                }
                SkillMarker::CalculatorResult(text) => Some(format!("Calculation: {text}")),
                SkillMarker::WeatherRequest(city) => {
                    Some(self.lookup_weather(city, creds.get(ProviderKind::Weather)).await)
                }
            }
        };
        let search = async {
            if flags.perform_web_search {
                Some(self.run_search(transcript, creds.get(ProviderKind::Search)).await)
            } else {
                None
            }
        };

        let (skill, search) = tokio::join!(skill, search);
        Enrichment { skill, search }
    }

    async fn lookup_weather(&self, city: &str, key: Option<&str>) -> String {
        let Some(key) = key else {
            debug!(city, "No weather key; skipping lookup");
            return format!(
                "Weather API key not configured. I can't check the weather for {city}."
            );
        };
        match self.weather.current(city, key).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(city, error = %e, "Weather lookup failed");
                explain_weather_error(city, &e)
            }
        }
    }

    async fn run_search(&self, query: &str, key: Option<&str>) -> String {
        let Some(key) = key else {
            debug!("No search key; skipping web search");
            return "Web search API key not configured. I can't search the web right now."
                .to_string();
        };
        match self.search.search(query, key).await {
            Ok(digest) => format!("Web search results:\n{digest}"),
            Err(e) => {
                warn!(error = %e, "Web search failed");
                format!("Web search failed for: {query}")
            }
        }
    }
}

fn explain_weather_error(city: &str, err: &ProviderError) -> String {
    match err {
        ProviderError::Unauthorized => {
            "Invalid weather API key. Please check your configuration.".to_string()
        }
        ProviderError::NotFound(_) | ProviderError::Status { status: 404, .. } => {
            format!("Could not find weather information for {city}.")
        }
        ProviderError::Status { status, .. } => {
            format!("Could not get weather for {city}. Error: {status}")
        }
        _ => format!("Weather service is unavailable right now, so I can't check {city}."),
    }
}
