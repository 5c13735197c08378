//! Tavily web search.
//!
//! Returns the quick answer (when Tavily provides one) followed by the top
//! results as `title: snippet...` lines.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{ProviderError, WebSearch, check_status, trim_base_url};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RESULTS: usize = 3;
const SNIPPET_CHARS: usize = 200;

pub struct TavilyClient {
    pub base_url: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: trim_base_url(base_url, DEFAULT_BASE_URL),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Render a search response; `None` when there is nothing to report.
fn digest(response: &SearchResponse) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(answer) = response.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        lines.push(format!("Quick Answer: {}", answer.trim()));
    }
    let results = response
        .results
        .iter()
        .filter(|r| !r.title.trim().is_empty() && !r.content.trim().is_empty())
        .take(MAX_RESULTS);
    for result in results {
        let snippet: String = result.content.chars().take(SNIPPET_CHARS).collect();
        lines.push(format!("{}: {}...", result.title.trim(), snippet.trim()));
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, api_key: &str) -> Result<String, ProviderError> {
        debug!(query_chars = query.len(), "Running web search");
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .timeout(TIMEOUT)
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "search_depth": "basic",
                "include_answer": true,
                "max_results": MAX_RESULTS,
            }))
            .send()
            .await?;
        let body: SearchResponse = check_status(response).await?.json().await?;
        Ok(digest(&body).unwrap_or_else(|| format!("No search results found for: {query}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_answer_first() {
        let raw = r#"{
            "answer": "Paris",
            "results": [
                {"title": "France", "content": "The capital of France is Paris."},
                {"title": "Wiki", "content": "Paris is a city."}
            ]
        }"#;
        let body: SearchResponse = serde_json::from_str(raw).unwrap();
        let text = digest(&body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Quick Answer: Paris");
        assert_eq!(lines[1], "France: The capital of France is Paris....");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_snippet_truncated() {
        let long = "a".repeat(500);
        let body = SearchResponse {
            answer: None,
            results: vec![SearchResult {
                title: "T".into(),
                content: long,
            }],
        };
        let text = digest(&body).unwrap();
        assert_eq!(text.len(), "T: ".len() + SNIPPET_CHARS + 3);
    }

    #[test]
    fn test_skips_results_missing_title_or_snippet() {
        let raw = r#"{
            "results": [
                {"title": "", "content": "orphan snippet"},
                {"title": "No body", "content": "  "},
                {"title": "Kept", "content": "Useful text."}
            ]
        }"#;
        let body: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(digest(&body).unwrap(), "Kept: Useful text....");

        let only_blank: SearchResponse =
            serde_json::from_str(r#"{"results": [{"title": "", "content": ""}]}"#).unwrap();
        assert!(digest(&only_blank).is_none());
    }

    #[test]
    fn test_empty_response() {
        let body: SearchResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(digest(&body).is_none());
    }
}
