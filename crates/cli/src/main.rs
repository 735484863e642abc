//! tutorgraph CLI: the main entry point.
//!
//! Commands:
//! - `serve`   : Start the HTTP gateway (and the corpus sync listener)
//! - `context` : Assemble the response context for one message
//! - `graph`   : Print the knowledge graph as JSON
//! - `sync`    : Export the corpus for the trainer
//! - `train`   : Run the configured trainer on the token export
//! - `doctor`  : Diagnose config, store, model and export

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tutorgraph_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tutorgraph",
    about = "tutorgraph: adaptive context retrieval for programming tutors",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.tutorgraph/config.toml)
    #[arg(short, long, global = true, env = "TUTORGRAPH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Assemble the response context for a message
    Context {
        /// The learner's message
        message: String,

        /// Learner id, enables error remediation
        #[arg(short, long)]
        user: Option<String>,

        /// Print the full result as JSON instead of the preamble
        #[arg(long)]
        json: bool,
    },

    /// Print the knowledge graph as JSON
    Graph {
        /// Keep only these categories (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Keep only these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Free-text search over labels and exemplar text
        #[arg(short, long)]
        search: Option<String>,

        /// Augment with this learner's error profile
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Export the active exemplars and their token groups
    Sync {
        /// Skip the export when it is already current
        #[arg(long)]
        if_needed: bool,
    },

    /// Train the embedding model from the token export
    Train,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };

    // Initialize tracing: RUST_LOG wins, then the configured filter
    let fallback = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.log_filter.clone().unwrap_or_else(|| "info".into()),
        (Err(_), false) => "info".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&fallback)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Doctor => commands::doctor::run(cli.config.as_deref(), loaded).await?,
        command => {
            let config = loaded.map_err(|e| format!("Failed to load config: {e}"))?;
            dispatch(command, config).await?;
        }
    }

    Ok(())
}

async fn dispatch(command: Commands, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve { port } => commands::serve::run(config, port).await,
        Commands::Context { message, user, json } => {
            commands::context::run(config, &message, user.as_deref(), json).await
        }
        Commands::Graph {
            categories,
            tags,
            search,
            user,
        } => commands::graph::run(config, categories, tags, search, user).await,
        Commands::Sync { if_needed } => commands::sync::run(config, if_needed).await,
        Commands::Train => commands::train::run(config).await,
        Commands::Doctor => commands::doctor::run(None, Ok(config)).await,
    }
}
