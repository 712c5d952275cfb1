//! # shipflow
#![allow(clippy::uninlined_format_args)]
//!
//! Browser automation for a small logistics operation: three sequential
//! workflows driven through third-party web portals that have no API.
//!
//! 1. **WMS scrape**: log in, open the picking-complete grid, page through it
//!    until the next-page control is disabled, then reclassify and group the
//!    rows by shipping method.
//! 2. **Label barcodes**: submit tracking codes to the shipping-label portal,
//!    detect the job it creates by comparing against the highest job id seen
//!    beforehand, wait for it to finish, print its label page to PDF and pull
//!    the 16-character barcodes out of the text.
//! 3. **Store scan**: confirm a phone number on the convenience-store portal
//!    and check in each barcode, isolating per-item failures.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Credentials come from flags or the environment
//! export SHIPFLOW_WMS_USERNAME=me@example.com SHIPFLOW_WMS_PASSWORD=...
//! shipflow wms --format simple
//!
//! # Codes as arguments or @file, one per line
//! shipflow labels -u user -p pass @codes.txt
//!
//! shipflow store-scan -u user -p pass --phone 0912345678 @barcodes.txt
//!
//! # Selector sets, URLs and timeouts live in ~/.shipflow/config.json
//! shipflow config init
//! shipflow config show
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `shipflow=info`); results go to
//! stdout as JSON unless `--format simple` is given. Failures print a JSON
//! error object and exit with a code per error kind.
//!
//! ## Library Usage
//!
//! ```no_run
//! use shipflow::config::Config;
//! use shipflow::progress::{Progress, Stage};
//! use shipflow::types::Credentials;
//! use shipflow::workflows::run_wms_scrape;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let (progress, mut rx) = Progress::channel(Stage::Wms);
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         eprintln!("{}", event.message);
//!     }
//! });
//!
//! let credentials = Credentials::new("me@example.com", "secret");
//! let report = run_wms_scrape(&config, &credentials, &progress).await?;
//! println!("{} rows", report.reconciliation.all.total);
//! # Ok(())
//! # }
//! ```

/// Portal login
pub mod auth;

/// Versioned configuration: URLs, selector sets, timeouts
pub mod config;

/// Screenshot and markup capture on failure
pub mod diagnostics;

/// Error taxonomy and exit codes
pub mod errors;

/// Barcode extraction from printed documents
pub mod extract;

/// Paginated grid scraping
pub mod grid;

/// Element locators and wait strategies
pub mod locator;

/// Progress narration channel
pub mod progress;

/// Reclassification and grouped reports
pub mod reconcile;

/// Per-item store portal scanning
pub mod scan;

/// WebDriver browser session
pub mod session;

/// New-job detection on the label portal
pub mod tasks;

/// Shared data types
pub mod types;

/// Bounded polling
pub mod wait;

/// Automatic chromedriver process management
pub mod webdriver_manager;

/// End-to-end workflows
pub mod workflows;

pub use config::Config;
pub use errors::{AutomationError, AutomationResult};
pub use locator::{Locator, WaitFor};
pub use progress::{Progress, ProgressEvent, Stage};
pub use reconcile::{Reconciler, Reconciliation, ReportBundle};
pub use session::Session;
pub use types::{Credentials, OutputFormat, ScanTally, ScrapedRecord, TaskId, ViewportSize};
