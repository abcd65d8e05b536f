//! Main Entrypoint for the IELTS Examiner
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Initializing logging.
//! 3. Building the examiner for the configured backend.
//! 4. Running the session loop on the console until the candidate leaves.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use clap::Parser;
use examiner_core::{
    examiner::{Examiner, LLMExaminer, SimulatedExaminer},
    llm_client::{LLMClient, OpenAICompatibleClient},
    session::SessionController,
    voice::VoiceChannel,
};
use examiner_service::{
    config::{Backend, Config},
    console::ConsoleChannel,
    prompts::load_prompts,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Simulated IELTS Speaking examiner.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Use the offline scripted examiner instead of a language model.
    #[arg(long)]
    simulate: bool,

    /// Directory for generated reports (overrides REPORTS_DIR).
    #[arg(long)]
    reports_dir: Option<PathBuf>,
}

/// Listens for the `Ctrl+C` signal to stop the session.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Ending session...");
}

fn build_examiner(config: &Config) -> anyhow::Result<Arc<dyn Examiner>> {
    let (api_key, api_base) = match config.backend {
        Backend::Simulated => {
            info!("Using simulated examiner.");
            return Ok(Arc::new(SimulatedExaminer::new()));
        }
        Backend::OpenAI => {
            info!("Using OpenAI backend.");
            (&config.openai_api_key, "https://api.openai.com/v1/")
        }
        Backend::Gemini => {
            info!("Using Gemini backend.");
            (
                &config.gemini_api_key,
                "https://generativelanguage.googleapis.com/v1beta/openai",
            )
        }
    };
    let api_key = api_key
        .as_ref()
        .context("API key missing for the configured backend")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);
    let client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let prompts = load_prompts(&config.prompts_path)?;
    Ok(Arc::new(LLMExaminer::new(client, &prompts)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --- 1. Load Configuration ---
    let config = if args.simulate {
        Config::from_env_with_backend(Backend::Simulated)
    } else {
        Config::from_env()
    };
    let mut config = config.context("Failed to load configuration")?;
    if let Some(dir) = args.reports_dir {
        config.reports_dir = dir;
    }

    // --- 2. Initialize Logging ---
    // stdout carries the conversation, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(
        backend = ?config.backend,
        model = %config.chat_model,
        reports_dir = %config.reports_dir.display(),
        "Configuration loaded."
    );

    // --- 3. Initialize the Examiner and Voice Channel ---
    let examiner = build_examiner(&config)?;
    let voice: Arc<dyn VoiceChannel> = Arc::new(ConsoleChannel::stdio());
    let mut session = SessionController::new(examiner, voice, config.report_config());

    // --- 4. Run the Session ---
    session.greet().await?;
    tokio::select! {
        result = session.run() => result?,
        _ = shutdown_signal() => {},
    }

    info!("Examiner has shut down.");
    Ok(())
}
