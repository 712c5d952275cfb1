use anyhow::Result;
use tracing::info;

use crate::commands::utils;
use shipflow::config::Config;
use shipflow::progress::Stage;
use shipflow::types::{Credentials, OutputFormat};
use shipflow::workflows::run_store_scan;

pub async fn handle_store_scan(
    config: &Config,
    username: String,
    password: String,
    phone: String,
    barcodes: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let barcodes = utils::read_items(&barcodes)?;
    info!("Scanning {} barcode(s)", barcodes.len());
    let credentials = Credentials::new(username, password);

    let (progress, printer) = utils::progress_printer(Stage::StoreScan);
    let result = run_store_scan(config, &credentials, &phone, &barcodes, &progress).await;
    utils::finish_progress(progress, printer).await;
    let tally = result?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tally)?);
        }
        OutputFormat::Simple => {
            println!("Success: {}/{}", tally.success, tally.total);
            if !tally.failed_list.is_empty() {
                println!("Failed:");
                for item in &tally.failed_list {
                    println!("  {}", item);
                }
            }
        }
    }
    Ok(())
}
