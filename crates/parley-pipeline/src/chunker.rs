//! Splits replies into synthesis-sized chunks.
//!
//! Budgets are in characters, not bytes. Each cut lands on the last
//! whitespace at or before the boundary; a word longer than the budget is
//! hard-cut.

use parley_providers::{ProviderError, SpeechSynthesis};
use tracing::debug;

/// Split `text` into chunks of at most `budget` characters.
pub fn chunk_text(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let Some((limit, boundary_char)) = rest.char_indices().nth(budget) else {
            chunks.push(rest.to_string());
            break;
        };

        // Include the char at the boundary: a space there allows a full-size chunk.
        let search = &rest[..limit + boundary_char.len_utf8()];
        match search.rfind(char::is_whitespace) {
            Some(ws) if ws > 0 => {
                chunks.push(rest[..ws].trim_end().to_string());
                rest = rest[ws..].trim_start();
            }
            _ => {
                chunks.push(rest[..limit].to_string());
                rest = &rest[limit..];
            }
        }
    }

    chunks
}

/// Synthesize each chunk in order. The first failure fails the whole batch.
pub async fn synthesize_chunks(
    tts: &dyn SpeechSynthesis,
    chunks: &[String],
    voice_id: &str,
    api_key: &str,
) -> Result<Vec<String>, ProviderError> {
    let mut urls = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let url = tts.synthesize(chunk, voice_id, api_key).await?;
        debug!(index, chars = chunk.chars().count(), "Synthesized chunk");
        urls.push(url);
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn without_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn assert_chunking_properties(text: &str, budget: usize) {
        let chunks = chunk_text(text, budget);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= budget,
                "chunk {chunk:?} exceeds budget {budget}"
            );
            assert!(!chunk.is_empty());
        }
        assert_eq!(without_whitespace(&chunks.concat()), without_whitespace(text));
    }

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(chunk_text("hello world", 3000), vec!["hello world"]);
        assert!(chunk_text("   ", 10).is_empty());
    }

    #[test]
    fn test_cuts_on_whitespace() {
        let chunks = chunk_text("alpha beta gamma delta", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_space_exactly_at_boundary() {
        let chunks = chunk_text("abcde fghij", 5);
        assert_eq!(chunks, vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_never_splits_words_when_space_available() {
        let text = "the quick brown fox jumps over the lazy dog";
        let chunks = chunk_text(text, 12);
        let words: Vec<&str> = text.split(' ').collect();
        for chunk in &chunks {
            for word in chunk.split(' ') {
                assert!(words.contains(&word), "split word {word:?}");
            }
        }
    }

    #[test]
    fn test_properties_across_budgets() {
        let text = "Rust gives you memory safety without garbage collection. \
                    Ownership rules are checked at compile time, and the borrow \
                    checker keeps references valid. Überlänge wörter wie \
                    Donaudampfschifffahrtsgesellschaftskapitän get hard cuts.";
        for budget in [1, 3, 7, 16, 40, 100, 3000] {
            assert_chunking_properties(text, budget);
        }
    }

    #[test]
    fn test_multibyte_budget_counts_chars() {
        let text = "ééééé ééééé";
        let chunks = chunk_text(text, 5);
        assert_eq!(chunks, vec!["ééééé", "ééééé"]);
    }

    struct RecordingTts {
        seen: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl SpeechSynthesis for RecordingTts {
        async fn synthesize(
            &self,
            text: &str,
            _voice_id: &str,
            _api_key: &str,
        ) -> Result<String, ProviderError> {
            let mut seen = self.seen.lock().unwrap();
            if self.fail_on == Some(seen.len()) {
                return Err(ProviderError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            seen.push(text.to_string());
            Ok(format!("https://audio/{}.mp3", seen.len()))
        }
    }

    #[tokio::test]
    async fn test_synthesize_preserves_order() {
        let tts = RecordingTts {
            seen: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let chunks = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let urls = synthesize_chunks(&tts, &chunks, "v", "k").await.unwrap();
        assert_eq!(
            urls,
            vec![
                "https://audio/1.mp3",
                "https://audio/2.mp3",
                "https://audio/3.mp3"
            ]
        );
        assert_eq!(*tts.seen.lock().unwrap(), chunks);
    }

    #[tokio::test]
    async fn test_any_chunk_failure_fails_batch() {
        let tts = RecordingTts {
            seen: Mutex::new(Vec::new()),
            fail_on: Some(1),
        };
        let chunks = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let err = synthesize_chunks(&tts, &chunks, "v", "k").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
    }
}
