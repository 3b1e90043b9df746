//! GroundChat CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive chat or single-question mode
//! - `tokens`: Estimate the prompt tokens of a saved message list
//! - `doctor`: Check configuration without contacting any service

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "groundchat",
    about = "GroundChat: chat grounded in your document index",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.groundchat/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with your documents
    Chat {
        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Estimate tokens for a JSON array of messages
    Tokens {
        /// Path to the JSON file
        file: PathBuf,

        /// Model identifier to count for
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Diagnose configuration
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the transcript
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Chat { message } => commands::chat::run(config, message).await?,
        Commands::Tokens { file, model } => commands::tokens::run(config, &file, model).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
