use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use shipflow::config::Config;
use shipflow::progress::{Progress, ProgressEvent, Stage};

/// Load the effective config, applying CLI overrides
pub fn load_config(path: Option<&Path>, headless: bool) -> Result<Config> {
    let mut config = Config::load(path)?;
    if headless {
        config.session.headless = true;
    }
    Ok(config)
}

/// Expand `@file` arguments and split on whitespace, dropping blanks
pub fn read_items(args: &[String]) -> Result<Vec<String>> {
    let mut items = Vec::new();
    for arg in args {
        let source = match arg.strip_prefix('@') {
            Some(path) => {
                fs::read_to_string(path).context(format!("Failed to read item list {}", path))?
            }
            None => arg.clone(),
        };
        items.extend(source.split_whitespace().map(str::to_string));
    }

    if items.is_empty() {
        anyhow::bail!("No items given");
    }
    Ok(items)
}

/// Progress handle whose messages are echoed to stderr
pub fn progress_printer(stage: Stage) -> (Progress, JoinHandle<()>) {
    let (progress, rx) = Progress::channel(stage);
    (progress, tokio::spawn(print_progress(rx)))
}

async fn print_progress(mut rx: UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        eprintln!("[{}] {}", event.stage, event.message);
    }
}

/// Drop the sender and let the printer drain
pub async fn finish_progress(progress: Progress, printer: JoinHandle<()>) {
    drop(progress);
    let _ = printer.await;
}
