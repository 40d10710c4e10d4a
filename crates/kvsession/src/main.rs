//! kvsession - inspect and manage stored sessions.
//!
//! Main entry point for the kvsession CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, session};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// kvsession - inspect and manage stored sessions
#[derive(Parser)]
#[command(name = "kvsession")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Extra config file, applied after discovered ones
    #[arg(short, long, global = true, env = "KVSESSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides session.store.database)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show a live session
    Get(session::GetArgs),

    /// Create a session or replace a live session's data
    Put(session::PutArgs),

    /// Restart a session's expiration window
    Refresh(session::RefreshArgs),

    /// Delete a session
    Delete(session::DeleteArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable.
    let filter = if cli.verbose {
        "kvsession=debug,kvsession_store=debug,kvsession_config=debug,info"
    } else {
        "kvsession=info,kvsession_store=warn,kvsession_config=warn,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let loaded = kvsession_config::load_config(cli.config.as_deref())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        loaded,
        database: cli.database,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Get(args) => session::get(args, &ctx).await,
        Commands::Put(args) => session::put(args, &ctx).await,
        Commands::Refresh(args) => session::refresh(args, &ctx).await,
        Commands::Delete(args) => session::delete(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
