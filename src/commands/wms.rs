use anyhow::Result;
use tracing::info;

use crate::commands::utils;
use shipflow::config::Config;
use shipflow::progress::Stage;
use shipflow::types::{Credentials, OutputFormat};
use shipflow::workflows::run_wms_scrape;

pub async fn handle_wms(
    config: &Config,
    username: String,
    password: String,
    format: OutputFormat,
) -> Result<()> {
    info!("Running WMS scrape");
    let credentials = Credentials::new(username, password);

    let (progress, printer) = utils::progress_printer(Stage::Wms);
    let result = run_wms_scrape(config, &credentials, &progress).await;
    utils::finish_progress(progress, printer).await;
    let report = result?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Simple => {
            println!("Captured: {}", report.reconciliation.all.timestamp);
            println!();
            println!("== Default methods ==");
            for line in report.reconciliation.filtered.summary_lines() {
                println!("{}", line);
            }
            println!();
            println!("== All methods ==");
            for line in report.reconciliation.all.summary_lines() {
                println!("{}", line);
            }
            if !report.reconciliation.seven_eleven_codes.is_empty() {
                println!();
                println!("== 7-11 codes ==");
                for code in &report.reconciliation.seven_eleven_codes {
                    println!("{}", code);
                }
            }
        }
    }
    Ok(())
}
