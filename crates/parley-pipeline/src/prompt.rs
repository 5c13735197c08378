//! Prompt assembly and concise-mode shaping.

use parley_core::persona::Persona;
use parley_core::session::ChatTurn;
use parley_providers::GenerationRequest;

/// Appended to the utterance when the caller asks for a short answer.
pub const CONCISE_INSTRUCTION: &str =
    "(Answer concisely in no more than two or three short sentences.)";

/// Builds bounded-context generation requests.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    /// History entries carried into each prompt.
    pub prompt_turns: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { prompt_turns: 10 }
    }
}

impl PromptBuilder {
    pub fn new(prompt_turns: usize) -> Self {
        Self { prompt_turns }
    }

    /// Persona instruction + the last `prompt_turns` history entries + the
    /// current utterance. The rendered form ends with an assistant cue.
    pub fn build(&self, persona: &Persona, history: &[ChatTurn], utterance: &str) -> GenerationRequest {
        let skip = history.len().saturating_sub(self.prompt_turns);
        GenerationRequest::new(
            persona.system_prompt,
            history[skip..].to_vec(),
            utterance,
        )
    }
}

pub fn concise_utterance(utterance: &str) -> String {
    format!("{}\n\n{CONCISE_INSTRUCTION}", utterance.trim())
}

/// Shorten `reply` to at most `max_chars` characters.
///
/// Prefers the last sentence end in range, then the last whitespace, then a
/// hard cut. Replies already within budget are returned trimmed.
pub fn shorten_reply(reply: &str, max_chars: usize) -> String {
    let reply = reply.trim();
    if max_chars == 0 || reply.chars().count() <= max_chars {
        return reply.to_string();
    }

    let limit = reply
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(reply.len());
    let window = &reply[..limit];

    let sentence_end = window
        .char_indices()
        .filter(|&(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, c)| i + c.len_utf8())
        .filter(|&end| end > limit / 3)
        .last();
    if let Some(end) = sentence_end {
        return window[..end].trim_end().to_string();
    }

    match window.rfind(char::is_whitespace) {
        Some(ws) if ws > 0 => window[..ws].trim_end().to_string(),
        _ => window.to_string(),
    }
}
