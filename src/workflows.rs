//! The three end-to-end workflows. Each owns one browser session and closes it
//! on every exit path.

use serde::Serialize;
use tracing::{error, info};

use crate::auth::login;
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::errors::{AutomationError, AutomationResult};
use crate::extract::BarcodeExtractor;
use crate::grid::{GridScraper, ScrapeEnd, WmsGrid, open_pickup_view};
use crate::progress::{Progress, Stage};
use crate::reconcile::{Reconciler, Reconciliation};
use crate::scan::{BatchScanner, StorePortal, enter_section};
use crate::session::Session;
use crate::tasks::{LabelBoard, TaskWatcher, open_other_users};
use crate::types::{Credentials, ScanTally, TaskId};

/// Result of the WMS scrape
#[derive(Debug, Clone, Serialize)]
pub struct WmsReport {
    pub pages: usize,
    pub skipped_rows: usize,
    pub ended_by: ScrapeEnd,
    #[serde(flatten)]
    pub reconciliation: Reconciliation,
}

/// Result of the label workflow
#[derive(Debug, Clone, Serialize)]
pub struct LabelReport {
    pub task_id: TaskId,
    pub high_water_mark: TaskId,
    pub submitted: usize,
    /// Deduplicated and sorted
    pub barcodes: Vec<String>,
    pub matched_pattern: Option<String>,
}

async fn start(config: &Config, progress: &Progress) -> AutomationResult<Session> {
    progress.say("Starting browser");
    Session::open(&config.session, &config.timeouts).await
}

/// Capture diagnostics for fatal errors, then always close the session
async fn finish<T>(
    session: Session,
    config: &Config,
    stage: Stage,
    result: AutomationResult<T>,
) -> AutomationResult<T> {
    if let Err(e) = &result {
        error!(stage = %stage, "Workflow failed: {}", e);
        if e.is_fatal() {
            Diagnostics::new(config.diagnostics_dir())
                .capture(&session, stage)
                .await;
        }
    }
    session.close().await;
    result
}

/// Log in to the WMS, scrape the picking-complete grid and build both report views
pub async fn run_wms_scrape(
    config: &Config,
    credentials: &Credentials,
    progress: &Progress,
) -> AutomationResult<WmsReport> {
    let session = start(config, progress).await?;
    let result = wms_steps(&session, config, credentials, progress).await;
    finish(session, config, Stage::Wms, result).await
}

async fn wms_steps(
    session: &Session,
    config: &Config,
    credentials: &Credentials,
    progress: &Progress,
) -> AutomationResult<WmsReport> {
    progress.say("Logging in to WMS");
    login(session, &config.wms.login, credentials).await?;

    progress.say("Opening picking-complete orders");
    open_pickup_view(session, &config.wms).await?;

    let grid = WmsGrid::new(session, &config.wms.grid);
    let outcome = GridScraper::new(&config.timeouts)
        .scrape(&grid, progress)
        .await?;
    progress.say(format!(
        "Scraped {} records from {} page(s)",
        outcome.records.len(),
        outcome.pages
    ));

    let reconciliation = Reconciler::new(&config.report).reconcile(&outcome.records);
    Ok(WmsReport {
        pages: outcome.pages,
        skipped_rows: outcome.skipped_rows,
        ended_by: outcome.ended_by,
        reconciliation,
    })
}

/// Submit codes to the label portal and pull barcodes out of the printed job
pub async fn run_label_barcodes(
    config: &Config,
    credentials: &Credentials,
    codes: &[String],
    progress: &Progress,
) -> AutomationResult<LabelReport> {
    if codes.is_empty() {
        return Err(anyhow::anyhow!("No tracking codes to submit").into());
    }
    let extractor = BarcodeExtractor::new(config.label.barcode_patterns.as_slice())?;

    let session = start(config, progress).await?;
    let result = label_steps(&session, config, credentials, codes, &extractor, progress).await;
    finish(session, config, Stage::Labels, result).await
}

async fn label_steps(
    session: &Session,
    config: &Config,
    credentials: &Credentials,
    codes: &[String],
    extractor: &BarcodeExtractor,
    progress: &Progress,
) -> AutomationResult<LabelReport> {
    progress.say("Logging in to label portal");
    login(session, &config.label.login, credentials).await?;
    open_other_users(session, &config.label).await?;

    let board = LabelBoard::new(session, &config.label);
    let artifact = TaskWatcher::new(&config.timeouts, config.label.max_scroll_passes)
        .submit_and_await(&board, codes, progress)
        .await?;

    progress.say("Reading barcodes from label document");
    let extraction = extractor.extract_identifiers(&artifact.pdf)?;
    if extraction.is_empty() {
        progress.say("No barcodes found in the document");
        Diagnostics::new(config.diagnostics_dir()).dump_text(
            Stage::Labels,
            "pdf",
            &extraction.text,
        );
    } else {
        progress.say(format!("Found {} barcode(s)", extraction.barcodes.len()));
    }

    Ok(LabelReport {
        task_id: artifact.task_id,
        high_water_mark: artifact.high_water_mark,
        submitted: codes.len(),
        barcodes: extraction.barcodes,
        matched_pattern: extraction.matched_pattern,
    })
}

/// Check barcodes in one at a time on the store portal
pub async fn run_store_scan(
    config: &Config,
    credentials: &Credentials,
    phone: &str,
    barcodes: &[String],
    progress: &Progress,
) -> AutomationResult<ScanTally> {
    if phone.trim().is_empty() {
        return Err(AutomationError::Other(anyhow::anyhow!(
            "A phone number is required for store scanning"
        )));
    }
    if barcodes.is_empty() {
        info!("No barcodes to scan");
        return Ok(ScanTally::default());
    }

    let session = start(config, progress).await?;
    let result = store_steps(&session, config, credentials, phone.trim(), barcodes, progress).await;
    finish(session, config, Stage::StoreScan, result).await
}

async fn store_steps(
    session: &Session,
    config: &Config,
    credentials: &Credentials,
    phone: &str,
    barcodes: &[String],
    progress: &Progress,
) -> AutomationResult<ScanTally> {
    progress.say("Logging in to store portal");
    login(session, &config.store.login, credentials).await?;

    progress.say("Opening C2C quick receive");
    enter_section(session, &config.store).await?;

    progress.say("Confirming phone number");
    let portal = StorePortal::open(session, &config.store, phone).await?;

    let tally = BatchScanner::new(&config.timeouts)
        .scan_batch(&portal, barcodes, progress)
        .await;
    progress.say(format!(
        "Scanned {}/{} successfully",
        tally.success, tally.total
    ));
    Ok(tally)
}
