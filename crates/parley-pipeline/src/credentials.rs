//! Credential resolution: per-session override first, then the server-wide
//! key from config or environment.

use std::collections::HashMap;

use parley_core::config::Config;
use parley_core::error::StageError;
use parley_core::session::SessionConfig;
use parley_core::types::ProviderKind;

/// API keys in effect for one pipeline run.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<ProviderKind, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets.
        f.debug_struct("Credentials")
            .field("configured", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-wide keys from config file and environment.
    pub fn from_config(config: &Config) -> Self {
        let keys = ProviderKind::ALL
            .into_iter()
            .filter_map(|kind| config.resolve_key(kind).map(|key| (kind, key)))
            .collect();
        Self { keys }
    }

    pub fn with(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.keys.insert(kind, key);
        }
        self
    }

    /// Layer a session's overrides on top of these keys.
    pub fn overlay(&self, session: &SessionConfig) -> Self {
        let mut keys = self.keys.clone();
        for kind in ProviderKind::ALL {
            if let Some(key) = session.credential(kind) {
                keys.insert(kind, key.to_string());
            }
        }
        Self { keys }
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    /// The key for `kind`, or a `config` stage error.
    pub fn require(&self, kind: ProviderKind) -> Result<&str, StageError> {
        self.get(kind)
            .ok_or_else(|| StageError::config(format!("Missing {kind} API key")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::Stage;

    #[test]
    fn test_session_override_wins() {
        let server = Credentials::new()
            .with(ProviderKind::Llm, "server-llm")
            .with(ProviderKind::Stt, "server-stt");
        let mut session = SessionConfig::default();
        session.set_credential(ProviderKind::Llm, "session-llm");

        let creds = server.overlay(&session);
        assert_eq!(creds.get(ProviderKind::Llm), Some("session-llm"));
        assert_eq!(creds.get(ProviderKind::Stt), Some("server-stt"));
        assert_eq!(creds.get(ProviderKind::Tts), None);
    }

    #[test]
    fn test_require_reports_config_stage() {
        let err = Credentials::new().require(ProviderKind::Stt).unwrap_err();
        assert_eq!(err.stage, Stage::Config);
        assert_eq!(err.http_status, 500);
        assert!(err.detail.contains("aai"));
    }

    #[test]
    fn test_blank_keys_ignored() {
        let creds = Credentials::new().with(ProviderKind::Weather, "  ");
        assert_eq!(creds.get(ProviderKind::Weather), None);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::new().with(ProviderKind::Llm, "super-secret");
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
