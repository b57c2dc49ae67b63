//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration, defaults included
    Show,

    /// Show which config files were loaded
    Which,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    if ctx.sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in &ctx.sources {
            println!("# Loaded from {}", source.display());
        }
    }
    println!();
    print!("{}", ctx.config.resolved().to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    if ctx.sources.is_empty() {
        println!("No config files loaded (using defaults)");
        return Ok(());
    }
    for (i, source) in ctx.sources.iter().enumerate() {
        println!("{}. {}", i + 1, source.display());
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    match scribe_config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("No user config directory available on this platform"),
    }
    Ok(())
}
