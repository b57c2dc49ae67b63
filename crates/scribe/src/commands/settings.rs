//! Settings command - read and write user settings.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use scribe_session::{SettingsCache, SettingsDocument};

use super::Context;

/// Arguments for the settings command.
#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print a user's settings as JSON
    Get {
        /// User id
        user: String,
    },

    /// Replace a user's settings with a JSON object
    Set {
        /// User id
        user: String,

        /// Settings document, e.g. '{"language": "en-US"}'
        json: String,
    },

    /// Merge top-level fields into a user's settings (null removes a field)
    Merge {
        /// User id
        user: String,

        /// Fields to overlay, e.g. '{"font_size": 14}'
        json: String,
    },
}

/// Run the settings command.
pub async fn run(args: SettingsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.settings_store();
    if ctx.verbose {
        eprintln!("Settings directory: {}", store.root().display());
    }
    let cache = SettingsCache::new(ctx.services_config().settings, store);

    match args.command {
        SettingsCommand::Get { user } => match cache.get(&user).await? {
            Some(document) => println!("{}", document.to_json_pretty()?),
            None => println!("No settings stored for {user}"),
        },
        SettingsCommand::Set { user, json } => {
            let document = parse_document(&json)?;
            cache.save(&user, document).await?;
            println!("Saved settings for {user}");
        }
        SettingsCommand::Merge { user, json } => {
            let patch = parse_document(&json)?;
            let merged = cache.update(&user, patch).await?;
            println!("{}", merged.to_json_pretty()?);
        }
    }

    Ok(())
}

fn parse_document(json: &str) -> Result<SettingsDocument> {
    SettingsDocument::from_json_str(json).context("settings must be a JSON object")
}
