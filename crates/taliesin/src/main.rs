//! Taliesin - streaming web research agent.
//!
//! Main entry point for the Taliesin CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Taliesin - streaming web research agent
#[derive(Parser)]
#[command(name = "taliesin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Taliesin server
    Serve(commands::serve::ServeArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "taliesin=debug,taliesin_agent=debug,taliesin_llm=debug,taliesin_retrieval=debug,taliesin_server=debug,info"
    } else {
        "taliesin=info,taliesin_agent=info,taliesin_llm=info,taliesin_retrieval=info,taliesin_server=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily("logs", "taliesin.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "taliesin=trace,taliesin_agent=trace,taliesin_llm=trace,taliesin_retrieval=trace,taliesin_server=trace,info",
                )),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
    }
}
