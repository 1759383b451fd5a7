//! CodeCouncil CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Create the config directory and a starter config
//! - `agent`    — Run one agent session in-process and follow it
//! - `gateway`  — Start the HTTP API server
//! - `status`   — Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "codecouncil",
    about = "CodeCouncil — autonomous code audit agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Run an agent against a goal and print its steps
    Agent {
        /// What the agent should accomplish
        #[arg(short, long)]
        goal: String,

        /// Persona the agent adopts (defaults to the configured role)
        #[arg(short, long)]
        role: Option<String>,

        /// Source file to include as context (repeatable)
        #[arg(short, long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Model API key for this run only
        #[arg(long, env = "CODECOUNCIL_RUN_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show system status
    Status {
        /// Also ask the default provider whether it is reachable
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent {
            goal,
            role,
            files,
            api_key,
        } => commands::agent::run(goal, role, files, api_key).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Status { check } => commands::status::run(check).await?,
    }

    Ok(())
}
