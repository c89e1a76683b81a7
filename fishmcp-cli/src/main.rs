use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use fishmcp_core::model::{build_model, Device, MockBehavior};
use fishmcp_core::settings::BackendConfig;
use fishmcp_core::{
    serve_stdio, speech_tools, ReferenceRegistry, ReferenceStore, Settings, SettingsManager,
    SpeechMcpServer, Synthesizer, ToolRegistry,
};

#[derive(Parser, Debug)]
#[command(name = "fish-speech-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server for Fish Speech text-to-speech and voice cloning over stdio")]
struct Args {
    /// Settings file (defaults to ~/.fish-speech-mcp/settings.toml)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Device the model runs on
    #[arg(long, value_name = "cuda|cpu")]
    device: Option<Device>,

    /// Run the model in half precision
    #[arg(long, conflicts_with = "no_half")]
    half: bool,

    /// Run the model in full precision
    #[arg(long)]
    no_half: bool,

    /// Compile the model for faster inference
    #[arg(long)]
    compile: bool,

    /// Fish Speech API server URL
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Keep uploaded reference voices in this directory across restarts
    #[arg(long, value_name = "PATH")]
    references_dir: Option<PathBuf>,

    /// Use the built-in mock model instead of Fish Speech
    #[arg(long, conflicts_with = "endpoint")]
    mock: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let manager = match &args.settings {
        Some(path) => SettingsManager::from_path(path.clone())?,
        None => SettingsManager::new()?,
    };
    info!(path = ?manager.path(), "Loaded settings");

    let mut settings = manager.into_settings();
    apply_overrides(&args, &mut settings);

    info!(
        device = %settings.model.device,
        half = settings.model.half,
        compile = settings.model.compile,
        backend = ?settings.model.backend,
        persist_dir = ?settings.references.persist_dir,
        "Server startup"
    );

    let max_audio_bytes = settings.references.max_audio_bytes;
    let references = match &settings.references.persist_dir {
        Some(dir) => ReferenceRegistry::with_store(max_audio_bytes, ReferenceStore::new(dir.clone()))
            .with_context(|| format!("Failed to load reference voices from {dir:?}"))?,
        None => ReferenceRegistry::new(max_audio_bytes),
    };
    let references = Arc::new(references);

    let model = build_model(&settings.model);
    let synthesizer = Arc::new(Synthesizer::new(
        references.clone(),
        model,
        &settings.synthesis,
    ));
    let tools = Arc::new(ToolRegistry::new(speech_tools(references, synthesizer)));

    serve_stdio(SpeechMcpServer::new(tools)).await
}

/// Command line flags win over the settings file.
fn apply_overrides(args: &Args, settings: &mut Settings) {
    let model = &mut settings.model;

    if let Some(device) = args.device {
        model.device = device;
    }
    if args.half {
        model.half = true;
    }
    if args.no_half {
        model.half = false;
    }
    if args.compile {
        model.compile = true;
    }

    if let Some(url) = &args.endpoint {
        match &mut model.backend {
            BackendConfig::FishSpeech { endpoint, .. } => *endpoint = url.clone(),
            backend => {
                *backend = BackendConfig::FishSpeech {
                    endpoint: url.clone(),
                    api_key: None,
                    launch: None,
                }
            }
        }
    }
    if args.mock {
        model.backend = BackendConfig::Mock {
            behavior: MockBehavior::Success,
        };
    }

    if let Some(dir) = &args.references_dir {
        settings.references.persist_dir = Some(dir.clone());
    }
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    // stdout carries the MCP transport, so traces go to a file
    let trace_dir = SettingsManager::home_dir()?.join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("server.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
