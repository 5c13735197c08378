//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ProviderKind;

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<ProvidersConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    8000
}

// --- Typed provider config ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Speech-to-text (AssemblyAI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt: Option<ProviderConfig>,

    /// Language model (Gemini).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<ProviderConfig>,

    /// Speech synthesis (Murf).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<ProviderConfig>,

    /// Current weather (OpenWeatherMap).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<ProviderConfig>,

    /// Web search (Tavily).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<ProviderConfig>,
}

/// Configuration for a single external provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model id (language model only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Voice id override (speech synthesis only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        match kind {
            ProviderKind::Stt => self.stt.as_ref(),
            ProviderKind::Llm => self.llm.as_ref(),
            ProviderKind::Tts => self.tts.as_ref(),
            ProviderKind::Weather => self.weather.as_ref(),
            ProviderKind::Search => self.search.as_ref(),
        }
    }
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// User+assistant pairs kept per session.
    pub max_turns: usize,
    /// History entries included in each prompt.
    pub prompt_turns: usize,
    /// Per-call character budget for speech synthesis.
    pub tts_chunk_chars: usize,
    /// Reply length cap when the concise flag is set.
    pub concise_reply_chars: usize,
    /// Whole-run deadline in seconds. 0 disables it.
    pub deadline_secs: u64,
    pub stt_poll: PollConfig,
    pub tts_poll: PollConfig,
    /// Spool uploaded audio here for the duration of a run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_audio_dir: Option<String>,
    /// City used when a weather request names none.
    pub default_city: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            prompt_turns: 10,
            tts_chunk_chars: 3000,
            concise_reply_chars: 400,
            deadline_secs: 120,
            stt_poll: PollConfig::default(),
            tts_poll: PollConfig {
                max_attempts: 30,
                interval_ms: 1000,
            },
            stage_audio_dir: None,
            default_city: "London".into(),
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }

    pub fn stage_audio_dir(&self) -> Option<PathBuf> {
        self.stage_audio_dir.as_deref().map(expand_tilde)
    }
}

/// Bounded poll settings for submit-then-poll providers.
/// Fields left out of a partial override take the values below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_ms: 1000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Honour the `x-debug-fail` header. Never enable in production.
    #[serde(default)]
    pub allow_forced_failures: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "parley_pipeline=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::ParleyError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::ParleyError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or(8000)
    }

    /// Gateway bind address.
    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        self.pipeline.clone().unwrap_or_default()
    }

    pub fn allow_forced_failures(&self) -> bool {
        self.debug.as_ref().is_some_and(|d| d.allow_forced_failures)
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.as_ref().and_then(|p| p.get(kind))
    }

    /// Server-wide key for a provider: config first, then its conventional env var.
    pub fn resolve_key(&self, kind: ProviderKind) -> Option<String> {
        self.provider(kind)
            .and_then(|p| p.resolve_api_key())
            .or_else(|| {
                std::env::var(kind.default_env_var())
                    .ok()
                    .filter(|v| !v.is_empty())
            })
    }

    pub fn base_url(&self, kind: ProviderKind) -> Option<&str> {
        self.provider(kind).and_then(|p| p.base_url.as_deref())
    }

    /// Language model id.
    pub fn llm_model(&self) -> String {
        self.provider(ProviderKind::Llm)
            .and_then(|p| p.model.clone())
            .or_else(|| std::env::var("GEMINI_MODEL").ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "gemini-1.5-flash".to_string())
    }

    /// Voice override applied on top of the persona voice.
    pub fn tts_voice(&self) -> Option<&str> {
        self.provider(ProviderKind::Tts)
            .and_then(|p| p.voice.as_deref())
    }

    /// Get a config value by dotted path (e.g. "gateway.port", "pipeline.max_turns").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        for kind in ProviderKind::ALL {
            if self.resolve_key(kind).is_none() {
                let note = match kind {
                    ProviderKind::Weather | ProviderKind::Search => {
                        "; sessions must supply their own key"
                    }
                    _ => "; requests fail unless a session supplies a key",
                };
                warnings.push(format!(
                    "Provider '{kind}' has no API key configured (set {}){note}",
                    kind.default_env_var()
                ));
            }
        }

        if self.allow_forced_failures() {
            warnings.push("debug.allow_forced_failures is enabled".to_string());
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        let pipeline = self.pipeline();
        if pipeline.tts_chunk_chars == 0 {
            errors.push("pipeline.tts_chunk_chars must be positive".to_string());
        }
        if pipeline.max_turns == 0 {
            errors.push("pipeline.max_turns must be positive".to_string());
        }
        for (name, poll) in [("stt_poll", pipeline.stt_poll), ("tts_poll", pipeline.tts_poll)] {
            if poll.max_attempts == 0 {
                errors.push(format!("pipeline.{name}.max_attempts must be positive"));
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Parley data: `~/.parley/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}
