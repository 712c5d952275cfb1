//! Paginated grid scraping with sentinel-based refresh detection.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{GridSelectors, Timeouts, WmsConfig};
use crate::errors::{AutomationError, AutomationResult};
use crate::locator::WaitFor;
use crate::progress::Progress;
use crate::session::Session;
use crate::types::ScrapedRecord;
use crate::wait::poll_until;

/// What the scraper needs from a paginated list UI
#[allow(async_fn_in_trait)]
pub trait GridPage {
    /// Run the query that populates the grid
    async fn trigger_query(&self) -> AutomationResult<()>;

    /// Block until the loading indicator is hidden
    async fn wait_loading_gone(&self) -> AutomationResult<()>;

    /// Whether a loading indicator is showing right now
    async fn is_loading(&self) -> AutomationResult<bool>;

    /// Wait for at least one row; `false` means the page is empty
    async fn wait_for_rows(&self) -> AutomationResult<bool>;

    /// Text of the first row, `None` when there are no rows
    async fn first_row_text(&self) -> AutomationResult<Option<String>>;

    /// One result per row; a failed row does not fail the page
    async fn read_rows(&self) -> AutomationResult<Vec<AutomationResult<ScrapedRecord>>>;

    /// Next-page control exists and is enabled
    async fn has_next_page(&self) -> AutomationResult<bool>;

    async fn click_next(&self) -> AutomationResult<()>;
}

/// Why a scrape stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeEnd {
    /// A page had no rows
    NoRows,
    /// Next-page control absent or disabled
    LastPage,
    /// Pagination never visibly refreshed
    RefreshTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScrapeOutcome {
    pub records: Vec<ScrapedRecord>,
    /// Pages whose rows were read
    pub pages: usize,
    pub skipped_rows: usize,
    pub ended_by: ScrapeEnd,
}

/// Drives a [`GridPage`] to exhaustion
pub struct GridScraper {
    page_refresh: Duration,
    poll_interval: Duration,
}

impl GridScraper {
    pub fn new(timeouts: &Timeouts) -> Self {
        Self {
            page_refresh: timeouts.page_refresh(),
            poll_interval: timeouts.poll_interval(),
        }
    }

    pub async fn scrape<P: GridPage>(
        &self,
        page: &P,
        progress: &Progress,
    ) -> AutomationResult<ScrapeOutcome> {
        page.trigger_query().await?;
        page.wait_loading_gone().await?;

        let mut records = Vec::new();
        let mut pages = 0;
        let mut skipped_rows = 0;

        let ended_by = loop {
            if !page.wait_for_rows().await? {
                debug!("No rows on page {}, stopping", pages + 1);
                break ScrapeEnd::NoRows;
            }

            let sentinel = page.first_row_text().await?;
            pages += 1;

            let mut kept = 0;
            for (index, row) in page.read_rows().await?.into_iter().enumerate() {
                match row {
                    Ok(record) if record.is_meaningful() => {
                        records.push(record);
                        kept += 1;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Skipping row {} on page {}: {}", index + 1, pages, e);
                        skipped_rows += 1;
                    }
                }
            }
            progress.say(format!("Page {}: {} rows (total {})", pages, kept, records.len()));

            if !page.has_next_page().await? {
                info!("Last page reached after {} page(s)", pages);
                break ScrapeEnd::LastPage;
            }

            page.click_next().await?;
            match self.wait_for_refresh(page, sentinel.as_deref()).await {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => {
                    warn!("{}; keeping {} records", e, records.len());
                    progress.say("Next page did not load in time, stopping with partial data");
                    break ScrapeEnd::RefreshTimeout;
                }
                Err(e) => return Err(e),
            }
        };

        Ok(ScrapeOutcome {
            records,
            pages,
            skipped_rows,
            ended_by,
        })
    }

    /// Both the loading indicator is gone and the first row changed
    async fn wait_for_refresh<P: GridPage>(
        &self,
        page: &P,
        sentinel: Option<&str>,
    ) -> AutomationResult<()> {
        let refreshed = poll_until(self.page_refresh, self.poll_interval, move || async move {
            match page.is_loading().await {
                Ok(false) => {}
                _ => return None,
            }
            match page.first_row_text().await {
                Ok(current) if current.as_deref() != sentinel => Some(()),
                _ => None,
            }
        })
        .await;

        refreshed.ok_or(AutomationError::PageRefreshTimeout(self.page_refresh))
    }
}

/// A next-page control counts as disabled by property, class or ARIA state
pub fn control_disabled(enabled: bool, class: Option<&str>, aria_disabled: Option<&str>) -> bool {
    !enabled
        || class.is_some_and(|c| c.split_whitespace().any(|name| name == "disabled"))
        || aria_disabled == Some("true")
}

/// The WMS order grid
pub struct WmsGrid<'a> {
    session: &'a Session,
    selectors: &'a GridSelectors,
}

impl<'a> WmsGrid<'a> {
    pub fn new(session: &'a Session, selectors: &'a GridSelectors) -> Self {
        Self { session, selectors }
    }
}

impl GridPage for WmsGrid<'_> {
    async fn trigger_query(&self) -> AutomationResult<()> {
        let timeout = self.session.timeouts().element();
        self.session
            .click_locator(&self.selectors.query_button, timeout)
            .await
    }

    async fn wait_loading_gone(&self) -> AutomationResult<()> {
        let timeout = self.session.timeouts().page_refresh();
        self.session
            .wait_gone(&self.selectors.loading_indicator, timeout)
            .await
    }

    async fn is_loading(&self) -> AutomationResult<bool> {
        self.session.is_visible(&self.selectors.loading_indicator).await
    }

    async fn wait_for_rows(&self) -> AutomationResult<bool> {
        let timeout = self.session.timeouts().row_presence();
        match self
            .session
            .wait_for(&self.selectors.rows, WaitFor::Presence, timeout)
            .await
        {
            Ok(_) => Ok(true),
            Err(AutomationError::ElementNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn first_row_text(&self) -> AutomationResult<Option<String>> {
        match self.session.find_all(&self.selectors.first_row).await?.first() {
            Some(row) => Ok(Some(row.text().await?)),
            None => Ok(None),
        }
    }

    async fn read_rows(&self) -> AutomationResult<Vec<AutomationResult<ScrapedRecord>>> {
        let rows = self.session.find_all(&self.selectors.rows).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            results.push(self.read_row(row).await);
        }
        Ok(results)
    }

    async fn has_next_page(&self) -> AutomationResult<bool> {
        let Some(button) = self
            .session
            .find_all(&self.selectors.next_button)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(false);
        };

        let enabled = button.is_enabled().await?;
        let class = button.attr("class").await?;
        let aria = button.attr("aria-disabled").await?;
        Ok(!control_disabled(enabled, class.as_deref(), aria.as_deref()))
    }

    async fn click_next(&self) -> AutomationResult<()> {
        let timeout = self.session.timeouts().element();
        let button = self
            .session
            .wait_for(&self.selectors.next_button, WaitFor::Presence, timeout)
            .await?;
        self.session.click(&button).await
    }
}

impl WmsGrid<'_> {
    async fn read_row(&self, row: &crate::session::Element) -> AutomationResult<ScrapedRecord> {
        let method = self
            .session
            .find_in(row, &self.selectors.method_cell)
            .await?
            .text()
            .await?;
        let input = self.session.find_in(row, &self.selectors.code_input).await?;
        let code = self.session.value_of(&input).await?;
        Ok(ScrapedRecord::new(method, code))
    }
}

/// Open the pickup view and switch to the picking-complete tab
pub async fn open_pickup_view(session: &Session, wms: &WmsConfig) -> AutomationResult<()> {
    let timeouts = session.timeouts();
    session
        .click_locator(&wms.pickup_link, timeouts.navigation())
        .await?;
    session
        .wait_for(&wms.default_tab, WaitFor::Visible, timeouts.navigation())
        .await?;
    session
        .click_locator(&wms.complete_tab, timeouts.element())
        .await?;
    debug!("Pickup view ready");
    Ok(())
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;
