//! taskloop CLI, the main entry point.
//!
//! Commands:
//! - `chat`: Interactive REPL or single-message mode
//! - `tools`: List the tools offered to the model
//! - `config`: Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "taskloop",
    about = "taskloop: chat with a model that can read, write and search local files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (defaults to ~/.taskloop/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print token usage, timing and cost after each turn
        #[arg(long)]
        debug: bool,
    },

    /// List the tools available to the model
    Tools,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A missing .env file is fine.
    dotenv::dotenv().ok();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chat { message, debug } => commands::chat::run(config_path, message, debug).await?,
        Commands::Tools => commands::tools::run(config_path)?,
        Commands::Config => commands::config_cmd::show(config_path)?,
    }

    Ok(())
}
