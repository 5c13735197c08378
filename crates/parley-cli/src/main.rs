mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use parley_core::config::Config;
use parley_core::locks::SessionLocks;
use parley_core::session_store::SessionStore;
use parley_core::types::{PipelineRequest, TurnFlags};
use parley_gateway::GatewayState;
use parley_pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Voice assistant pipeline: speech in, spoken reply out",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,

        /// Serve only the API and static assets, without the voice UI page
        #[arg(long)]
        no_ui: bool,
    },

    /// Run conversational turns locally, one per audio file
    Chat {
        /// Audio files, sent in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Session id (default: a fresh UUID)
        #[arg(short, long)]
        session: Option<String>,

        /// Persona tag (neutral, pirate, cowboy, robot, teacher)
        #[arg(short, long)]
        persona: Option<String>,

        /// Enrich each turn with a web search
        #[arg(long)]
        search: bool,

        /// Ask for a short reply
        #[arg(long)]
        concise: bool,
    },

    /// Transcribe an audio file
    Transcribe { file: PathBuf },

    /// Synthesize speech and print the audio URL
    Speak { text: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (secrets redacted)
    Show,
    /// Get a specific config value by dotted path
    Get { key: String },
    /// Validate configuration and report problems
    Check,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    // Initialize logging
    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose)?;

    if cli.command.runs_pipeline() {
        ensure_valid(&config)?;
    }

    match cli.command {
        Commands::Serve { port, no_ui } => serve(config, port, !no_ui).await?,
        Commands::Chat {
            files,
            session,
            persona,
            search,
            concise,
        } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let flags = TurnFlags {
                perform_web_search: search,
                concise,
            };
            chat(&config, &session, persona.as_deref(), &files, flags).await?;
        }
        Commands::Transcribe { file } => {
            let audio = read_audio(&file).await?;
            let transcript = local_pipeline(&config)
                .transcribe_only(audio, None)
                .await?;
            println!("{transcript}");
        }
        Commands::Speak { text } => {
            let url = local_pipeline(&config).synthesize_text(&text, None).await?;
            println!("{url}");
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let mut json = serde_json::to_value(&config)?;
                redact_secrets(&mut json);
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            ConfigAction::Get { key } => {
                let mut value = config
                    .get_path(&key)
                    .ok_or_else(|| anyhow::anyhow!("No config value at '{key}'"))?;
                if key.ends_with("api_key") {
                    value = Value::String("***".into());
                } else {
                    redact_secrets(&mut value);
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            ConfigAction::Check => check(&config, &config_path)?,
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Config::default().save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
        },
    }

    Ok(())
}

impl Commands {
    /// Commands that build a pipeline and need a valid config first.
    fn runs_pipeline(&self) -> bool {
        !matches!(self, Commands::Config { .. })
    }
}

/// Log warnings and refuse to continue on configuration errors.
fn ensure_valid(config: &Config) -> anyhow::Result<()> {
    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("{error}");
        }
        anyhow::bail!("Invalid configuration ({} errors)", errors.len());
    }
    Ok(())
}

async fn serve(config: Config, port: Option<u16>, ui: bool) -> anyhow::Result<()> {
    let port = port.unwrap_or_else(|| config.gateway_port());
    tracing::info!("Starting Parley gateway on port {port}");

    let state = GatewayState::from_config(config);
    #[cfg(feature = "metrics")]
    let state = match parley_gateway::metrics::install_prometheus_recorder() {
        Some(handle) => state.with_metrics(handle),
        None => state,
    };

    parley_gateway::start_gateway(Arc::new(state), port, ui).await
}

fn local_pipeline(config: &Config) -> Pipeline {
    let sessions = Arc::new(SessionStore::new(config.pipeline().max_turns));
    Pipeline::from_config(config, sessions, Arc::new(SessionLocks::new()))
}

async fn read_audio(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))
}

async fn chat(
    config: &Config,
    session: &str,
    persona: Option<&str>,
    files: &[PathBuf],
    flags: TurnFlags,
) -> anyhow::Result<()> {
    let pipeline = local_pipeline(config);
    if let Some(persona) = persona {
        pipeline.sessions().set_persona(session, persona).await;
    }

    println!("Session: {session}");
    for file in files {
        let audio = read_audio(file).await?;
        let response = pipeline
            .run(PipelineRequest::new(session, audio, flags))
            .await?;

        println!("You:       {}", response.transcript);
        println!("Assistant: {}", response.reply_text);
        for url in &response.audio_urls {
            println!("  audio: {url}");
        }
        if response.fallback {
            println!("  (speech synthesis unavailable, fallback audio)");
        }
    }
    Ok(())
}

fn check(config: &Config, path: &Path) -> anyhow::Result<()> {
    println!("Config: {}", path.display());
    let (warnings, errors) = config.validate();
    for warning in &warnings {
        println!("  warning: {warning}");
    }
    for error in &errors {
        println!("  error:   {error}");
    }
    if !errors.is_empty() {
        anyhow::bail!("{} configuration errors", errors.len());
    }
    println!("OK ({} warnings)", warnings.len());
    Ok(())
}

/// Replace every `api_key` value with a placeholder.
fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key == "api_key" && v.is_string() {
                    *v = Value::String("***".into());
                } else {
                    redact_secrets(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}
