//! Coherence CLI
//!
//! Runs scripted scenarios against an in-memory engine on a simulated
//! clock, or keeps an engine up with its background reconciler running.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod scenario;

#[derive(Parser)]
#[command(name = "coherence")]
#[command(about = "Consistency-state coordination engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file against a fresh in-memory engine
    Simulate {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Engine configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the engine with background reconciliation until Ctrl-C
    Serve {
        /// Engine configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scenario whose contracts, models and steps seed the engine
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Configuration file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate {
            scenario,
            config,
            json,
        } => {
            commands::simulate::run(&scenario, config.as_deref(), json).await?;
        }

        Commands::Serve { config, scenario } => {
            commands::serve::run(config.as_deref(), scenario.as_deref()).await?;
        }

        Commands::CheckConfig { file } => {
            commands::check_config::run(&file)?;
        }
    }

    Ok(())
}
