//! StackIt - notifications from the terminal
//!
//! Main entry point for the StackIt CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod alerter;
mod commands;

use commands::{config, list, read_all, token, watch};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// StackIt - notifications from the terminal
#[derive(Parser)]
#[command(name = "stackit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: from the current context, else http://localhost:8000)
    #[arg(long, global = true, env = "STACKIT_SERVER_URL")]
    pub server: Option<String>,

    /// Context to use instead of current-context
    #[arg(long, global = true, env = "STACKIT_CONTEXT")]
    pub context: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List notifications, newest first
    List(list::ListArgs),

    /// Mark every notification read
    ReadAll(read_all::ReadAllArgs),

    /// Stay connected and print notifications as they arrive
    Watch(watch::WatchArgs),

    /// Manage the stored credential
    Token(token::TokenArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "stackit=debug,stackit_notify=debug,stackit_client=debug,stackit_config=debug,info"
    } else {
        "stackit=info,stackit_notify=warn,stackit_client=warn,stackit_config=warn,warn"
    };

    let log_dir = stackit_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "stackit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "stackit=trace,stackit_notify=trace,stackit_client=debug,stackit_config=debug,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        server_override: cli.server,
        context_name: cli.context,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::ReadAll(args) => read_all::run(args, &ctx).await,
        Commands::Watch(args) => watch::run(args, &ctx).await,
        Commands::Token(args) => token::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
