//! Best-effort evidence capture when a workflow fails.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::progress::Stage;
use crate::session::Session;

/// Writes screenshots, markup and text dumps into one directory
#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: PathBuf,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<stage>-<YYYYmmdd-HHMMSS>`
    pub fn file_stem(stage: Stage, at: DateTime<Local>) -> String {
        format!("{}-{}", stage, at.format("%Y%m%d-%H%M%S"))
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .context(format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(name);
        fs::write(&path, contents).context(format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Save a screenshot and the page markup. Failures are logged, never raised.
    pub async fn capture(&self, session: &Session, stage: Stage) -> Vec<PathBuf> {
        let stem = Self::file_stem(stage, Local::now());
        let mut written = Vec::new();

        match session.screenshot().await {
            Ok(png) => match self.write(&format!("{}.png", stem), &png) {
                Ok(path) => written.push(path),
                Err(e) => warn!("{:#}", e),
            },
            Err(e) => warn!("Screenshot failed: {}", e),
        }

        match session.page_source().await {
            Ok(html) => match self.write(&format!("{}.html", stem), html.as_bytes()) {
                Ok(path) => written.push(path),
                Err(e) => warn!("{:#}", e),
            },
            Err(e) => warn!("Page source unavailable: {}", e),
        }

        for path in &written {
            info!("Saved diagnostic {}", path.display());
        }
        written
    }

    /// Save extracted document text for pattern tuning
    pub fn dump_text(&self, stage: Stage, label: &str, text: &str) -> Option<PathBuf> {
        let name = format!("{}-{}.txt", Self::file_stem(stage, Local::now()), label);
        match self.write(&name, text.as_bytes()) {
            Ok(path) => {
                info!("Saved {} text to {}", label, path.display());
                Some(path)
            }
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }
}
