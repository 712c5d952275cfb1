use super::*;
use crate::progress::Stage;
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};

type Row = Result<ScrapedRecord, String>;

/// In-memory grid; a page switch can lag behind the loading indicator
struct FakeGrid {
    pages: Vec<Vec<Row>>,
    current: Cell<usize>,
    /// Target page and how many more first-row probes still show the old page
    pending: Cell<Option<(usize, u32)>>,
    /// Loading probes that still report busy after a click
    loading_left: Cell<u32>,
    /// Per destination page: (loading probes, stale first-row probes)
    swap_delays: Vec<(u32, u32)>,
    /// Page index after which content never swaps
    stuck_after: Option<usize>,
    fail_click: bool,
    clicks: Cell<usize>,
    next_checks: Cell<usize>,
    log: RefCell<Vec<String>>,
}

impl FakeGrid {
    fn new(pages: Vec<Vec<Row>>) -> Self {
        let swap_delays = vec![(0, 0); pages.len()];
        Self {
            pages,
            current: Cell::new(0),
            pending: Cell::new(None),
            loading_left: Cell::new(0),
            swap_delays,
            stuck_after: None,
            fail_click: false,
            clicks: Cell::new(0),
            next_checks: Cell::new(0),
            log: RefCell::new(Vec::new()),
        }
    }

    fn settle_pending(&self) {
        if let Some((target, left)) = self.pending.get() {
            if left == 0 {
                self.current.set(target);
                self.pending.set(None);
            } else {
                self.pending.set(Some((target, left - 1)));
            }
        }
    }

    fn row_text(row: &Row) -> String {
        match row {
            Ok(r) => format!("{} {}", r.shipping_method, r.tracking_code),
            Err(e) => e.clone(),
        }
    }
}

impl GridPage for FakeGrid {
    async fn trigger_query(&self) -> AutomationResult<()> {
        self.log.borrow_mut().push("query".into());
        Ok(())
    }

    async fn wait_loading_gone(&self) -> AutomationResult<()> {
        Ok(())
    }

    async fn is_loading(&self) -> AutomationResult<bool> {
        let left = self.loading_left.get();
        if left > 0 {
            self.loading_left.set(left - 1);
            return Ok(true);
        }
        Ok(false)
    }

    async fn wait_for_rows(&self) -> AutomationResult<bool> {
        Ok(!self.pages[self.current.get()].is_empty())
    }

    async fn first_row_text(&self) -> AutomationResult<Option<String>> {
        self.settle_pending();
        Ok(self.pages[self.current.get()].first().map(Self::row_text))
    }

    async fn read_rows(&self) -> AutomationResult<Vec<AutomationResult<ScrapedRecord>>> {
        self.log
            .borrow_mut()
            .push(format!("read page {}", self.current.get() + 1));
        Ok(self.pages[self.current.get()]
            .iter()
            .map(|row| {
                row.clone()
                    .map_err(AutomationError::ElementNotFound)
            })
            .collect())
    }

    async fn has_next_page(&self) -> AutomationResult<bool> {
        self.next_checks.set(self.next_checks.get() + 1);
        Ok(self.current.get() + 1 < self.pages.len())
    }

    async fn click_next(&self) -> AutomationResult<()> {
        if self.fail_click {
            return Err(AutomationError::ElementNotInteractable("next".into()));
        }
        self.clicks.set(self.clicks.get() + 1);
        let from = self.current.get();
        if self.stuck_after == Some(from) {
            self.loading_left.set(0);
            return Ok(());
        }
        let target = from + 1;
        let (loading, stale) = self.swap_delays[target];
        self.loading_left.set(loading);
        self.pending.set(Some((target, stale)));
        Ok(())
    }
}

fn ok(method: &str, code: &str) -> Row {
    Ok(ScrapedRecord::new(method, code))
}

fn three_pages() -> Vec<Vec<Row>> {
    vec![
        vec![ok("7-11", "F001"), ok("全家", "M001")],
        vec![ok("OK", "K001"), ok("7-11", "2002"), ok("", "  ")],
        vec![ok("萊爾富", "H001")],
    ]
}

fn scraper() -> GridScraper {
    let timeouts = Timeouts {
        page_refresh_ms: 5_000,
        poll_interval_ms: 100,
        ..Timeouts::default()
    };
    GridScraper::new(&timeouts)
}

#[tokio::test(start_paused = true)]
async fn test_three_pages_with_lagging_swap() {
    let mut grid = FakeGrid::new(three_pages());
    // Page 2: spinner clears at once but content swaps three probes later
    grid.swap_delays[1] = (0, 3);
    // Page 3: spinner shows for a while, content swaps with it
    grid.swap_delays[2] = (4, 0);

    let outcome = scraper()
        .scrape(&grid, &Progress::silent(Stage::Wms))
        .await
        .unwrap();

    assert_eq!(outcome.pages, 3);
    assert_eq!(grid.clicks.get(), 2);
    assert_eq!(outcome.ended_by, ScrapeEnd::LastPage);
    assert_eq!(
        outcome.records,
        vec![
            ScrapedRecord::new("7-11", "F001"),
            ScrapedRecord::new("全家", "M001"),
            ScrapedRecord::new("OK", "K001"),
            ScrapedRecord::new("7-11", "2002"),
            ScrapedRecord::new("萊爾富", "H001"),
        ]
    );
    assert_eq!(
        *grid.log.borrow(),
        vec!["query", "read page 1", "read page 2", "read page 3"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_next_page_after_termination() {
    let grid = FakeGrid::new(three_pages());
    scraper()
        .scrape(&grid, &Progress::silent(Stage::Wms))
        .await
        .unwrap();

    let checks = grid.next_checks.get();
    assert!(!grid.has_next_page().await.unwrap());
    assert!(!grid.has_next_page().await.unwrap());
    assert_eq!(grid.next_checks.get(), checks + 2);
    assert_eq!(grid.clicks.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_bad_rows_are_skipped() {
    let grid = FakeGrid::new(vec![vec![
        ok("7-11", "F001"),
        Err("stale cell".to_string()),
        ok("OK", "K001"),
    ]]);

    let outcome = scraper()
        .scrape(&grid, &Progress::silent(Stage::Wms))
        .await
        .unwrap();

    assert_eq!(outcome.skipped_rows, 1);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.ended_by, ScrapeEnd::LastPage);
}

#[tokio::test(start_paused = true)]
async fn test_empty_grid_is_not_an_error() {
    let grid = FakeGrid::new(vec![vec![]]);
    let outcome = scraper()
        .scrape(&grid, &Progress::silent(Stage::Wms))
        .await
        .unwrap();

    assert_eq!(outcome.pages, 0);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.ended_by, ScrapeEnd::NoRows);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_timeout_keeps_partial_data() {
    let mut grid = FakeGrid::new(three_pages());
    grid.stuck_after = Some(0);

    let (progress, mut rx) = Progress::channel(Stage::Wms);
    let outcome = scraper().scrape(&grid, &progress).await.unwrap();
    drop(progress);

    assert_eq!(outcome.ended_by, ScrapeEnd::RefreshTimeout);
    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.records.len(), 2);

    let mut messages = Vec::new();
    while let Some(event) = rx.recv().await {
        messages.push(event.message);
    }
    assert!(messages.iter().any(|m| m.contains("partial data")));
}

#[tokio::test(start_paused = true)]
async fn test_next_click_failure_is_fatal() {
    let mut grid = FakeGrid::new(three_pages());
    grid.fail_click = true;

    let err = scraper()
        .scrape(&grid, &Progress::silent(Stage::Wms))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::ElementNotInteractable(_)));
}

#[test]
fn test_control_disabled() {
    assert!(!control_disabled(true, Some("btn btn-default"), None));
    assert!(control_disabled(false, None, None));
    assert!(control_disabled(true, Some("btn disabled"), None));
    assert!(control_disabled(true, None, Some("true")));
    // Substring of another class name is not a match
    assert!(!control_disabled(true, Some("not-disabled-yet"), Some("false")));
}
