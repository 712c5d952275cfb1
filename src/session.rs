//! A single Chrome session driven over WebDriver.

use base64::Engine;
use fantoccini::error::CmdError;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

pub use fantoccini::elements::Element;

use crate::config::{SessionConfig, Timeouts};
use crate::errors::{AutomationError, AutomationResult};
use crate::locator::{Locator, QueryKind, WaitFor};
use crate::wait::poll_until;
use crate::webdriver_manager::GLOBAL_DRIVER_MANAGER;

const ENTER_KEY: &str = "\u{E007}";

/// A missing child element is `ElementNotFound`; anything else is a driver error
pub(crate) fn lookup_error(e: CmdError, locator: &Locator) -> AutomationError {
    if e.is_miss() {
        AutomationError::ElementNotFound(locator.to_string())
    } else {
        AutomationError::WebDriver(e)
    }
}

/// First handle in `now` that was not open in `known`
pub fn opened_window(known: &[WindowHandle], now: Vec<WindowHandle>) -> Option<WindowHandle> {
    now.into_iter().find(|handle| !known.contains(handle))
}

/// Browser session plus the throwaway profile it runs in
pub struct Session {
    pub(crate) client: Client,
    webdriver_url: String,
    timeouts: Timeouts,
    closed: AtomicBool,
    _profile_dir: TempDir,
}

/// Build the `goog:chromeOptions` capabilities for a launch
pub fn chrome_capabilities(
    config: &SessionConfig,
    profile_dir: &Path,
) -> serde_json::Map<String, Value> {
    let mut args = Vec::new();
    if config.no_sandbox {
        args.push("--no-sandbox".to_string());
    }
    if config.disable_dev_shm {
        args.push("--disable-dev-shm-usage".to_string());
    }
    args.push("--disable-blink-features=AutomationControlled".to_string());
    if config.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args.push(format!(
        "--window-size={},{}",
        config.viewport.width, config.viewport.height
    ));
    args.push(format!("--user-data-dir={}", profile_dir.display()));
    args.extend(config.extra_args.iter().cloned());

    let mut chrome_opts = serde_json::Map::new();
    chrome_opts.insert("args".to_string(), json!(args));
    chrome_opts.insert(
        "excludeSwitches".to_string(),
        json!(["enable-automation", "enable-logging"]),
    );

    let mut caps = serde_json::Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), Value::Object(chrome_opts));
    caps
}

fn to_driver_locator(kind: QueryKind, query: &str) -> fantoccini::Locator<'_> {
    match kind {
        QueryKind::Css => fantoccini::Locator::Css(query),
        QueryKind::Id => fantoccini::Locator::Id(query),
        QueryKind::XPath => fantoccini::Locator::XPath(query),
        QueryKind::LinkText => fantoccini::Locator::LinkText(query),
    }
}

impl Session {
    /// Start chromedriver if needed and open a fresh browser
    pub async fn open(config: &SessionConfig, timeouts: &Timeouts) -> AutomationResult<Self> {
        let webdriver_url = GLOBAL_DRIVER_MANAGER
            .ensure_driver(config.webdriver_url.as_deref())
            .await
            .map_err(|e| AutomationError::Launch(format!("{:#}", e)))?;

        let profile_dir = tempfile::Builder::new()
            .prefix("shipflow-chrome-")
            .tempdir()
            .map_err(|e| AutomationError::Launch(format!("Failed to create profile dir: {}", e)))?;

        let caps = chrome_capabilities(config, profile_dir.path());
        debug!("Connecting to WebDriver at {}", webdriver_url);

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&webdriver_url)
            .await
            .map_err(|e| AutomationError::Launch(e.to_string()))?;

        let vp = &config.viewport;
        if let Err(e) = client.set_window_size(vp.width, vp.height).await {
            debug!("Note: Could not set window size: {}", e);
        }

        info!(headless = config.headless, "Browser session started");
        Ok(Self {
            client,
            webdriver_url,
            timeouts: timeouts.clone(),
            closed: AtomicBool::new(false),
            _profile_dir: profile_dir,
        })
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// End the browser session. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.client.clone().close().await {
            Ok(()) => info!("Browser session closed"),
            Err(e) => warn!("Failed to close browser session cleanly: {}", e),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Navigate and give the document a moment to settle
    pub async fn goto(&self, url: &str) -> AutomationResult<()> {
        info!("Navigating to {}", url);
        self.client.goto(url).await?;
        self.wait_document_ready(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn wait_document_ready(&self, timeout: Duration) {
        let ready = poll_until(timeout, Duration::from_millis(100), move || async move {
            match self
                .client
                .execute("return document.readyState === 'complete';", vec![])
                .await
            {
                Ok(val) if val.as_bool().unwrap_or(false) => Some(()),
                _ => None,
            }
        })
        .await;
        if ready.is_none() {
            debug!("Document not complete after {:?}, continuing", timeout);
        }
    }

    pub async fn refresh(&self) -> AutomationResult<()> {
        self.client.refresh().await?;
        self.wait_document_ready(Duration::from_secs(2)).await;
        Ok(())
    }

    /// All current matches; an empty list is not an error
    pub async fn find_all(&self, locator: &Locator) -> AutomationResult<Vec<Element>> {
        let (kind, query) = locator.query();
        Ok(self.client.find_all(to_driver_locator(kind, &query)).await?)
    }

    /// Look up a child of `parent`
    pub async fn find_in(&self, parent: &Element, locator: &Locator) -> AutomationResult<Element> {
        let (kind, query) = locator.query();
        parent
            .find(to_driver_locator(kind, &query))
            .await
            .map_err(|e| lookup_error(e, locator))
    }

    async fn element_state(element: &Element) -> (bool, bool) {
        let displayed = element.is_displayed().await.unwrap_or(false);
        let enabled = element.is_enabled().await.unwrap_or(false);
        (displayed, enabled)
    }

    /// First match satisfying `condition`, if any, without waiting
    async fn first_matching(
        &self,
        locator: &Locator,
        condition: WaitFor,
    ) -> AutomationResult<Option<Element>> {
        for element in self.find_all(locator).await? {
            let (displayed, enabled) = Self::element_state(&element).await;
            if condition.accepts(displayed, enabled) {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Wait for a match of `locator` that satisfies `condition`.
    ///
    /// Nothing in the DOM within `timeout` is `ElementNotFound`; a match that
    /// never becomes visible/enabled within the interactable wait is
    /// `ElementNotInteractable`. `WaitFor::Invisible` is handled by
    /// [`Session::wait_gone`].
    pub async fn wait_for(
        &self,
        locator: &Locator,
        condition: WaitFor,
        timeout: Duration,
    ) -> AutomationResult<Element> {
        let interval = self.timeouts.poll_interval();

        let present = poll_until(timeout, interval, move || async move {
            match self.find_all(locator).await {
                Ok(found) => found.into_iter().next(),
                Err(e) => {
                    debug!("Lookup of {} failed: {}", locator, e);
                    None
                }
            }
        })
        .await
        .ok_or_else(|| AutomationError::ElementNotFound(locator.to_string()))?;

        if matches!(condition, WaitFor::Presence | WaitFor::Invisible) {
            return Ok(present);
        }

        poll_until(self.timeouts.interactable(), interval, move || async move {
            self.first_matching(locator, condition).await.ok().flatten()
        })
        .await
        .ok_or_else(|| AutomationError::ElementNotInteractable(locator.to_string()))
    }

    /// Try candidates in order and return the first that is present and clickable
    pub async fn find_first(
        &self,
        candidates: &[Locator],
        condition: WaitFor,
        timeout: Duration,
    ) -> AutomationResult<(usize, Element)> {
        let interval = self.timeouts.poll_interval();
        let hit = poll_until(timeout, interval, move || async move {
            for (index, candidate) in candidates.iter().enumerate() {
                if let Ok(Some(element)) = self.first_matching(candidate, condition).await {
                    return Some((index, element));
                }
            }
            None
        })
        .await;

        hit.ok_or_else(|| {
            let names: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
            AutomationError::ElementNotFound(names.join(" | "))
        })
    }

    /// Wait until no match of `locator` is displayed
    pub async fn wait_gone(&self, locator: &Locator, timeout: Duration) -> AutomationResult<()> {
        poll_until(timeout, self.timeouts.poll_interval(), move || async move {
            match self.first_matching(locator, WaitFor::Visible).await {
                Ok(None) => Some(()),
                _ => None,
            }
        })
        .await
        .ok_or_else(|| AutomationError::Timeout(format!("{} still visible after {:?}", locator, timeout)))
    }

    /// Whether any match of `locator` is displayed right now
    pub async fn is_visible(&self, locator: &Locator) -> AutomationResult<bool> {
        Ok(self.first_matching(locator, WaitFor::Visible).await?.is_some())
    }

    /// Click natively, falling back to a scripted click when intercepted
    pub async fn click(&self, element: &Element) -> AutomationResult<()> {
        if let Err(e) = element.click().await {
            debug!("Native click failed ({}), retrying via script", e);
            let arg = serde_json::to_value(element).map_err(anyhow::Error::from)?;
            self.client
                .execute("arguments[0].click();", vec![arg])
                .await?;
        }
        Ok(())
    }

    /// Wait for a clickable match and click it
    pub async fn click_locator(&self, locator: &Locator, timeout: Duration) -> AutomationResult<()> {
        let element = self.wait_for(locator, WaitFor::Clickable, timeout).await?;
        debug!("Clicking {}", locator);
        self.click(&element).await
    }

    /// Clear a field and type into it
    pub async fn fill(&self, element: &Element, text: &str) -> AutomationResult<()> {
        if let Err(e) = element.clear().await {
            debug!("Could not clear field: {}", e);
        }
        element.send_keys(text).await?;
        Ok(())
    }

    pub async fn press_enter(&self, element: &Element) -> AutomationResult<()> {
        element.send_keys(ENTER_KEY).await?;
        Ok(())
    }

    pub async fn value_of(&self, element: &Element) -> AutomationResult<String> {
        Ok(element.prop("value").await?.unwrap_or_default())
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> AutomationResult<Value> {
        Ok(self.client.execute(script, args).await?)
    }

    pub async fn element_arg(&self, element: &Element) -> AutomationResult<Value> {
        Ok(serde_json::to_value(element).map_err(anyhow::Error::from)?)
    }

    pub async fn scroll_to_top(&self) -> AutomationResult<()> {
        self.execute("window.scrollTo(0, 0);", vec![]).await?;
        Ok(())
    }

    pub async fn scroll_to_bottom(&self) -> AutomationResult<()> {
        self.execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await?;
        Ok(())
    }

    pub async fn scroll_by(&self, dy: i64) -> AutomationResult<()> {
        self.execute(&format!("window.scrollBy(0, {});", dy), vec![])
            .await?;
        Ok(())
    }

    /// `(scrollY + innerHeight, scrollHeight)`
    pub async fn scroll_position(&self) -> AutomationResult<(i64, i64)> {
        let value = self
            .execute(
                "return [Math.ceil(window.scrollY + window.innerHeight), document.body.scrollHeight];",
                vec![],
            )
            .await?;
        let read = |i: usize| value.get(i).and_then(|v| v.as_i64()).unwrap_or(0);
        Ok((read(0), read(1)))
    }

    pub async fn current_window(&self) -> AutomationResult<WindowHandle> {
        Ok(self.client.window().await?)
    }

    pub async fn windows(&self) -> AutomationResult<Vec<WindowHandle>> {
        Ok(self.client.windows().await?)
    }

    /// Wait for a window that is not in `known`, i.e. one opened after the snapshot
    pub async fn wait_for_new_window(
        &self,
        known: &[WindowHandle],
        timeout: Duration,
    ) -> AutomationResult<WindowHandle> {
        poll_until(timeout, self.timeouts.poll_interval(), move || async move {
            match self.client.windows().await {
                Ok(handles) => opened_window(known, handles),
                Err(_) => None,
            }
        })
        .await
        .ok_or_else(|| AutomationError::Timeout(format!("no new window within {:?}", timeout)))
    }

    pub async fn switch_to(&self, handle: WindowHandle) -> AutomationResult<()> {
        self.client.switch_to_window(handle).await?;
        Ok(())
    }

    /// Close the current window; the caller must switch to another afterwards
    pub async fn close_window(&self) -> AutomationResult<()> {
        self.client.close_window().await?;
        Ok(())
    }

    pub async fn screenshot(&self) -> AutomationResult<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    pub async fn page_source(&self) -> AutomationResult<String> {
        Ok(self.client.source().await?)
    }

    /// Render the current tab to PDF through chromedriver's CDP passthrough
    pub async fn print_to_pdf(&self) -> AutomationResult<Vec<u8>> {
        let session_id = self
            .client
            .session_id()
            .await?
            .ok_or_else(|| AutomationError::Extraction("no active session id".to_string()))?;
        let endpoint = format!(
            "{}/session/{}/goog/cdp/execute",
            self.webdriver_url.trim_end_matches('/'),
            session_id
        );

        let body = json!({
            "cmd": "Page.printToPDF",
            "params": {
                "landscape": false,
                "displayHeaderFooter": false,
                "printBackground": true,
                "preferCSSPageSize": true,
            }
        });

        let response: Value = reqwest::Client::new()
            .post(&endpoint)
            .json(&body)
            .timeout(self.timeouts.navigation())
            .send()
            .await
            .map_err(|e| AutomationError::Extraction(format!("print request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AutomationError::Extraction(format!("print response unreadable: {}", e)))?;

        let data = response
            .pointer("/value/data")
            .and_then(|d| d.as_str())
            .ok_or_else(|| {
                AutomationError::Extraction(format!("print returned no data: {}", response))
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| AutomationError::Extraction(format!("invalid PDF payload: {}", e)))?;
        debug!("Printed {} bytes of PDF", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViewportSize;

    fn args_of(caps: &serde_json::Map<String, Value>) -> Vec<String> {
        caps["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_headless_capabilities() {
        let config = SessionConfig {
            headless: true,
            viewport: ViewportSize {
                width: 1280,
                height: 800,
            },
            ..SessionConfig::default()
        };
        let caps = chrome_capabilities(&config, Path::new("/tmp/profile"));
        let args = args_of(&caps);

        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--window-size=1280,800".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert_eq!(
            caps["goog:chromeOptions"]["excludeSwitches"],
            json!(["enable-automation", "enable-logging"])
        );
    }

    fn handle(id: &str) -> WindowHandle {
        WindowHandle::try_from(id).unwrap()
    }

    #[test]
    fn test_opened_window_ignores_leftover_tabs() {
        let known = vec![handle("main"), handle("stale-print")];

        // Nothing new yet even though two windows exist
        assert_eq!(
            opened_window(&known, vec![handle("main"), handle("stale-print")]),
            None
        );
        assert_eq!(
            opened_window(
                &known,
                vec![handle("main"), handle("stale-print"), handle("print")]
            ),
            Some(handle("print"))
        );
    }

    #[test]
    fn test_lookup_error_keeps_driver_failures() {
        let locator = Locator::xpath("./div[2]/div[3]");
        let err = lookup_error(CmdError::NotJson("<html>".to_string()), &locator);
        assert!(matches!(err, AutomationError::WebDriver(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_visible_capabilities_with_extra_args() {
        let config = SessionConfig {
            no_sandbox: false,
            extra_args: vec!["--lang=zh-TW".to_string()],
            ..SessionConfig::default()
        };
        let args = args_of(&chrome_capabilities(&config, Path::new("/tmp/p")));

        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(!args.contains(&"--no-sandbox".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--lang=zh-TW"));
    }
}
