//! In-memory session store holding bounded history and config per session id.
//!
//! Records are created lazily on first reference and live for the whole
//! process. There is no eviction, so the map grows with the number of
//! distinct session ids seen.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::session::{ChatHistory, ChatTurn, ConfigUpdate, Role, SessionConfig, MAX_TURNS};
use crate::types::ProviderKind;

#[derive(Debug)]
struct SessionRecord {
    history: ChatHistory,
    config: SessionConfig,
}

/// Concurrency-safe keyed store of session records.
///
/// The outer map is only write-locked while inserting a new id; each record
/// has its own mutex so sessions never contend with each other.
pub struct SessionStore {
    max_turns: usize,
    records: RwLock<HashMap<String, Arc<Mutex<SessionRecord>>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(MAX_TURNS)
    }
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            records: RwLock::new(HashMap::new()),
        }
    }

    async fn record(&self, id: &str) -> Arc<Mutex<SessionRecord>> {
        if let Some(record) = self.records.read().await.get(id) {
            return record.clone();
        }
        let mut records = self.records.write().await;
        records
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session_id = id, "Created session record");
                Arc::new(Mutex::new(SessionRecord {
                    history: ChatHistory::new(self.max_turns),
                    config: SessionConfig::default(),
                }))
            })
            .clone()
    }

    /// Full bounded history, oldest first.
    pub async fn history(&self, id: &str) -> Vec<ChatTurn> {
        self.record(id).await.lock().await.history.snapshot()
    }

    /// Append a turn, truncating to capacity. Returns the new history length.
    pub async fn append(&self, id: &str, role: Role, content: impl Into<String>) -> usize {
        let record = self.record(id).await;
        let mut record = record.lock().await;
        record.history.push(ChatTurn::new(role, content));
        record.history.len()
    }

    pub async fn config(&self, id: &str) -> SessionConfig {
        self.record(id).await.lock().await.config.clone()
    }

    pub async fn set_credential(&self, id: &str, kind: ProviderKind, secret: &str) {
        let record = self.record(id).await;
        record.lock().await.config.set_credential(kind, secret);
    }

    pub async fn set_persona(&self, id: &str, persona: &str) {
        self.apply_config(
            id,
            &ConfigUpdate {
                persona: Some(persona.to_string()),
                ..Default::default()
            },
        )
        .await;
    }

    pub async fn apply_config(&self, id: &str, update: &ConfigUpdate) -> SessionConfig {
        let record = self.record(id).await;
        let mut record = record.lock().await;
        record.config.apply(update);
        debug!(session_id = id, persona = %record.config.persona, "Updated session config");
        record.config.clone()
    }

    /// Number of sessions seen so far.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
