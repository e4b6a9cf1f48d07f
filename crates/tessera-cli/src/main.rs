//! # tessera-cli
//!
//! Command-line interface for Tessera.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tessera_core::{Config, ReasoningEffort};
use tessera_providers::ModelRegistry;

mod commands;

/// Application context containing shared state.
pub struct AppContext {
    pub config: Config,
    pub registry: Arc<ModelRegistry>,
}

/// Tessera - provider adapter layer for coding agents
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Per-call options shared by `payload` and `chat`.
#[derive(clap::Args, Debug)]
pub struct CallArgs {
    /// Provider tag (zai, openai, anthropic, ...)
    provider: String,

    /// Model ID
    model: String,

    /// Prompt to send
    prompt: String,

    /// Reasoning effort (off, minimal, low, medium, high, xhigh)
    #[arg(short, long)]
    reasoning: Option<ReasoningEffort>,

    /// Keep reasoning traces across turns
    #[arg(long)]
    preserve_thinking: bool,

    /// Drop reasoning traces between turns
    #[arg(long, conflicts_with = "preserve_thinking")]
    discard_thinking: bool,

    /// Fail instead of dropping reasoning on models without it
    #[arg(long)]
    strict: bool,

    /// Maximum tokens to generate
    #[arg(long)]
    max_tokens: Option<u32>,

    /// System prompt
    #[arg(short, long)]
    system: Option<String>,
}

impl CallArgs {
    /// Preserve-thinking override from the flags; `None` defers to settings.
    pub fn preserve_override(&self) -> Option<bool> {
        if self.preserve_thinking {
            Some(true)
        } else if self.discard_thinking {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the model catalog
    Models {
        /// Only show models for this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Print the request body for a call without sending it
    Payload(CallArgs),
    /// Stream a completion from a provider
    Chat(CallArgs),
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load_validated().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let registry = Arc::new(ModelRegistry::from_config(&config));
    let ctx = Arc::new(AppContext { config, registry });

    match cli.command {
        Commands::Models { provider } => {
            commands::models::run(provider.as_deref(), &ctx)?;
        }
        Commands::Payload(args) => {
            commands::payload::run(&args, &ctx).await?;
        }
        Commands::Chat(args) => {
            commands::chat::run(&args, &ctx).await?;
        }
        Commands::Version => {
            println!("tessera {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
