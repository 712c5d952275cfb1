use anyhow::Result;
use tracing::info;

use crate::commands::utils;
use shipflow::config::Config;
use shipflow::progress::Stage;
use shipflow::types::{Credentials, OutputFormat};
use shipflow::workflows::run_label_barcodes;

pub async fn handle_labels(
    config: &Config,
    username: String,
    password: String,
    codes: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let codes = utils::read_items(&codes)?;
    info!("Submitting {} code(s) to the label portal", codes.len());
    let credentials = Credentials::new(username, password);

    let (progress, printer) = utils::progress_printer(Stage::Labels);
    let result = run_label_barcodes(config, &credentials, &codes, &progress).await;
    utils::finish_progress(progress, printer).await;
    let report = result?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Simple => {
            if report.barcodes.is_empty() {
                eprintln!("Task #{} produced no barcodes", report.task_id);
            }
            for barcode in &report.barcodes {
                println!("{}", barcode);
            }
        }
    }
    Ok(())
}
