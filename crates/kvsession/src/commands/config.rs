//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use kvsession_config::{ConfigSource, keys};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved session store settings
    Show,

    /// Show which config files are loaded and their precedence
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    let unset = || "(unset)".to_string();

    println!("# kvsession Configuration\n");
    println!(
        "  region:           {}",
        config.get_str(keys::STORE_REGION)?.unwrap_or_else(unset)
    );
    println!(
        "  table:            {}",
        config.get_str(keys::STORE_TABLE)?.unwrap_or_else(unset)
    );
    println!(
        "  credentials_file: {}",
        config
            .get_str(keys::STORE_CREDENTIALS_FILE)?
            .unwrap_or_else(unset)
    );
    println!("  database:         {}", ctx.database_path()?.display());
    println!(
        "  expiration:       {}s",
        config.u64_or(keys::SESSION_EXPIRATION, keys::DEFAULT_EXPIRATION_SECS)?
    );

    if !ctx.loaded.warnings.is_empty() {
        println!("\nWarnings:");
        for w in &ctx.loaded.warnings {
            println!("  ⚠ {}", w);
        }
    }

    if ctx.verbose {
        println!("\n---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.loaded.sources {
        let status = match (&source.error, source.loaded) {
            (Some(_), _) => "✗ failed",
            (None, true) => "✓ loaded",
            (None, false) => "· not found",
        };
        println!("  {} {}", status, source.path.display());
        if let Some(error) = &source.error {
            println!("      {}", error);
        }
    }

    Ok(())
}
