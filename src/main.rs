#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use crate::commands::config::ConfigCommands;
use shipflow::errors::exit_code_for;
use shipflow::types::OutputFormat;
use shipflow::webdriver_manager::GLOBAL_DRIVER_MANAGER;

const EXIT_SUCCESS: i32 = 0;

#[derive(Parser)]
#[command(name = "shipflow")]
#[command(about = "Browser automation for WMS scraping, label barcodes and store check-in", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.shipflow/config.json when present)
    #[arg(long, global = true, env = "SHIPFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    format: OutputFormat,

    /// Run the browser without a window
    #[arg(long, global = true)]
    headless: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape picking-complete orders from the WMS and report them by shipping method
    Wms {
        #[arg(short, long, env = "SHIPFLOW_WMS_USERNAME")]
        username: String,

        #[arg(short, long, env = "SHIPFLOW_WMS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Submit tracking codes to the label portal and extract the barcodes
    Labels {
        #[arg(short, long, env = "SHIPFLOW_LABEL_USERNAME")]
        username: String,

        #[arg(short, long, env = "SHIPFLOW_LABEL_PASSWORD", hide_env_values = true)]
        password: String,

        /// Tracking codes, or @file with one code per line
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Check barcodes in on the store portal one at a time
    StoreScan {
        #[arg(short, long, env = "SHIPFLOW_STORE_USERNAME")]
        username: String,

        #[arg(short, long, env = "SHIPFLOW_STORE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Phone number confirmed before scanning
        #[arg(long, env = "SHIPFLOW_STORE_PHONE")]
        phone: String,

        /// Barcodes, or @file with one barcode per line
        #[arg(required = true)]
        barcodes: Vec<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let result = run().await;

    // Always clean up chromedriver processes before exiting
    GLOBAL_DRIVER_MANAGER.stop_all();

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            let exit_code = exit_code_for(&err);

            // JSON on stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

async fn run() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Wms { username, password } => {
            let config = commands::utils::load_config(config_path, cli.headless)?;
            commands::wms::handle_wms(&config, username, password, cli.format).await?
        }

        Commands::Labels {
            username,
            password,
            codes,
        } => {
            let config = commands::utils::load_config(config_path, cli.headless)?;
            commands::labels::handle_labels(&config, username, password, codes, cli.format)
                .await?
        }

        Commands::StoreScan {
            username,
            password,
            phone,
            barcodes,
        } => {
            let config = commands::utils::load_config(config_path, cli.headless)?;
            commands::store_scan::handle_store_scan(
                &config, username, password, phone, barcodes, cli.format,
            )
            .await?
        }

        Commands::Config { command } => {
            commands::config::handle_config(command, config_path, cli.format)?
        }
    }

    Ok(())
}
