use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use std::path::Path;

use shipflow::config::Config;
use shipflow::types::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

pub fn handle_config(
    command: ConfigCommands,
    path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let target = match path {
                Some(p) => p.to_path_buf(),
                None => Config::default_path()?,
            };
            if target.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    target.display()
                );
            }
            Config::default().save(&target)?;

            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "written": target }))?
                ),
                OutputFormat::Simple => println!("Wrote {}", target.display()),
            }
        }
        ConfigCommands::Show => {
            let config = Config::load(path)?;
            // Always JSON: the config is a JSON document
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
