//! Session model: chat turns, bounded history and per-session overrides.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::persona::DEFAULT_PERSONA;
use crate::types::ProviderKind;

/// Number of user+assistant pairs retained per session.
pub const MAX_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering a transcript into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One role-tagged message in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only transcript holding at most `2 × max_turns` entries.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
    max_turns: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(MAX_TURNS)
    }
}

impl ChatHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        2 * self.max_turns
    }

    /// Append a turn, dropping the oldest entries beyond capacity.
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity() {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ChatTurn> {
        self.turns.iter().cloned().collect()
    }
}

/// Per-session credential overrides and persona selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub credentials: HashMap<ProviderKind, String>,
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_persona() -> String {
    DEFAULT_PERSONA.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials: HashMap::new(),
            persona: default_persona(),
        }
    }
}

impl SessionConfig {
    pub fn credential(&self, kind: ProviderKind) -> Option<&str> {
        self.credentials.get(&kind).map(String::as_str)
    }

    /// Set or clear an override. Blank secrets clear it.
    pub fn set_credential(&mut self, kind: ProviderKind, secret: &str) {
        let secret = secret.trim();
        if secret.is_empty() {
            self.credentials.remove(&kind);
        } else {
            self.credentials.insert(kind, secret.to_string());
        }
    }

    pub fn apply(&mut self, update: &ConfigUpdate) {
        for (kind, secret) in update.credentials() {
            self.set_credential(kind, secret);
        }
        if let Some(persona) = update.persona.as_deref() {
            let persona = persona.trim();
            self.persona = if persona.is_empty() {
                default_persona()
            } else {
                persona.to_ascii_lowercase()
            };
        }
    }
}

/// Body of the session configuration endpoint.
///
/// Every field is optional; a present-but-blank key clears the override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub murf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

impl ConfigUpdate {
    /// Credential fields that were present in the payload.
    pub fn credentials(&self) -> impl Iterator<Item = (ProviderKind, &str)> {
        [
            (ProviderKind::Tts, &self.murf),
            (ProviderKind::Stt, &self.aai),
            (ProviderKind::Llm, &self.gemini),
            (ProviderKind::Weather, &self.weather),
            (ProviderKind::Search, &self.search),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.as_deref().map(|v| (kind, v)))
    }
}
