//! Per-item barcode submission against the convenience-store portal.

use std::cell::RefCell;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{StoreConfig, Timeouts};
use crate::errors::{AutomationError, AutomationResult};
use crate::locator::WaitFor;
use crate::progress::Progress;
use crate::session::{Element, Session};
use crate::types::ScanTally;
use crate::wait::poll_until;

const TAB_KEY: &str = "\u{E004}";

const SET_PHONE_SCRIPT: &str = r#"
    var input = arguments[0];
    var value = arguments[1];
    var hook = arguments[2];
    input.focus();
    input.value = '';
    input.value = value;
    input.dispatchEvent(new Event('change', { bubbles: true }));
    if (hook && typeof window[hook] === 'function') {
        window[hook](input);
    }
    return input.value;
"#;

/// What the batch loop needs from the scanning page
#[allow(async_fn_in_trait)]
pub trait ScanPortal {
    /// Enter one item and confirm it
    async fn submit_item(&self, item: &str) -> AutomationResult<()>;

    /// Find the item input again; `false` when it is gone
    async fn relocate_input(&self) -> AutomationResult<bool>;

    /// Reload the page and redo phone confirmation
    async fn reset(&self) -> AutomationResult<()>;
}

/// Submits items one at a time, isolating per-item failures
pub struct BatchScanner {
    item_pause: Duration,
}

impl BatchScanner {
    pub fn new(timeouts: &Timeouts) -> Self {
        Self {
            item_pause: timeouts.item_pause(),
        }
    }

    pub async fn scan_batch<P: ScanPortal>(
        &self,
        portal: &P,
        items: &[String],
        progress: &Progress,
    ) -> ScanTally {
        let mut tally = ScanTally {
            total: items.len(),
            ..ScanTally::default()
        };

        for (index, item) in items.iter().enumerate() {
            progress.say(format!("[{}/{}] {}", index + 1, items.len(), item));

            match portal.submit_item(item).await {
                Ok(()) => tally.success += 1,
                Err(e) => {
                    warn!("Item {} failed: {}", item, e);
                    progress.say(format!("  failed: {}", e));
                    tally.failed += 1;
                    tally.failed_list.push(item.clone());
                    Self::recover(portal).await;
                }
            }

            sleep(self.item_pause).await;
        }

        info!(
            total = tally.total,
            success = tally.success,
            failed = tally.failed,
            "Batch scan finished"
        );
        tally
    }

    async fn recover<P: ScanPortal>(portal: &P) {
        match portal.relocate_input().await {
            Ok(true) => return,
            Ok(false) => debug!("Item input gone, resetting page"),
            Err(e) => debug!("Could not relocate item input: {}", e),
        }
        if let Err(e) = portal.reset().await {
            warn!("Page reset failed, continuing: {}", e);
        }
    }
}

/// Open the C2C quick-receive section
pub async fn enter_section(session: &Session, store: &StoreConfig) -> AutomationResult<()> {
    let (_, link) = session
        .find_first(
            &store.section_link,
            WaitFor::Clickable,
            session.timeouts().element(),
        )
        .await?;
    session.click(&link).await?;
    sleep(session.timeouts().scroll_settle()).await;
    Ok(())
}

/// Type the phone number, make sure the page accepted it, then confirm
pub async fn confirm_phone(session: &Session, store: &StoreConfig, phone: &str) -> AutomationResult<()> {
    let timeouts = session.timeouts();
    let input = session
        .wait_for(&store.phone_input, WaitFor::Presence, timeouts.element())
        .await?;

    let arg = session.element_arg(&input).await?;
    session
        .execute("arguments[0].scrollIntoView(true);", vec![arg.clone()])
        .await?;
    session.click(&input).await?;
    session.fill(&input, phone).await?;
    input.send_keys(TAB_KEY).await?;

    let typed = session.value_of(&input).await?;
    if typed.trim() != phone {
        warn!("Phone field holds {:?}, setting it by script", typed);
        let value = session
            .execute(
                SET_PHONE_SCRIPT,
                vec![
                    arg,
                    serde_json::json!(phone),
                    serde_json::json!(store.phone_query_hook),
                ],
            )
            .await?;
        if value.as_str().map(str::trim) != Some(phone) {
            warn!("Phone field still holds {:?}", value);
        }
    }

    let confirm = session
        .wait_for(&store.phone_confirm, WaitFor::Presence, timeouts.element())
        .await?;
    if confirm.attr("disabled").await?.is_some() {
        debug!("Confirm button disabled, enabling it");
        let arg = session.element_arg(&confirm).await?;
        session
            .execute("arguments[0].removeAttribute('disabled');", vec![arg])
            .await?;
    }
    session.click(&confirm).await?;
    sleep(timeouts.scroll_settle()).await;
    Ok(())
}

/// The store portal's scanning page, after phone confirmation
pub struct StorePortal<'a> {
    session: &'a Session,
    config: &'a StoreConfig,
    phone: String,
    input: RefCell<Option<Element>>,
    confirm: RefCell<Option<Element>>,
}

impl<'a> StorePortal<'a> {
    /// Confirm the phone number and locate the scanning controls
    pub async fn open(
        session: &'a Session,
        config: &'a StoreConfig,
        phone: impl Into<String>,
    ) -> AutomationResult<Self> {
        let portal = Self {
            session,
            config,
            phone: phone.into(),
            input: RefCell::new(None),
            confirm: RefCell::new(None),
        };
        confirm_phone(session, config, &portal.phone).await?;
        if !portal.relocate_input().await? {
            return Err(AutomationError::ElementNotFound(
                config
                    .item_input
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(" | "),
            ));
        }
        Ok(portal)
    }

    async fn locate_confirm(&self) -> AutomationResult<()> {
        let found = match self
            .session
            .find_first(&self.config.item_confirm, WaitFor::Presence, Duration::ZERO)
            .await
        {
            Ok((_, element)) => Some(element),
            Err(AutomationError::ElementNotFound(_)) => {
                debug!("No item confirm control, Enter will be used");
                None
            }
            Err(e) => return Err(e),
        };
        *self.confirm.borrow_mut() = found;
        Ok(())
    }

    async fn wait_for_ack(&self) {
        let ack = &self.config.ack_message;
        let timeouts = self.session.timeouts();
        let shown = poll_until(timeouts.item_ack(), timeouts.poll_interval(), move || async move {
            match self.session.find_all(ack).await {
                Ok(found) => {
                    for element in found {
                        if let Ok(text) = element.text().await
                            && !text.trim().is_empty()
                        {
                            return Some(text);
                        }
                    }
                    None
                }
                Err(_) => None,
            }
        })
        .await;
        match shown {
            Some(text) => debug!("Portal says: {}", text.trim()),
            None => debug!("No acknowledgement shown"),
        }
    }
}

impl ScanPortal for StorePortal<'_> {
    async fn submit_item(&self, item: &str) -> AutomationResult<()> {
        let input = self
            .input
            .borrow()
            .clone()
            .ok_or_else(|| AutomationError::ElementNotFound("item input".to_string()))?;
        self.session.fill(&input, item).await?;

        let confirm = self.confirm.borrow().clone();
        match confirm {
            Some(button) => self.session.click(&button).await?,
            None => self.session.press_enter(&input).await?,
        }

        self.wait_for_ack().await;
        Ok(())
    }

    async fn relocate_input(&self) -> AutomationResult<bool> {
        let found = self
            .session
            .find_first(
                &self.config.item_input,
                WaitFor::Presence,
                self.session.timeouts().element(),
            )
            .await;
        match found {
            Ok((_, element)) => {
                *self.input.borrow_mut() = Some(element);
                self.locate_confirm().await?;
                Ok(true)
            }
            Err(AutomationError::ElementNotFound(_)) => {
                *self.input.borrow_mut() = None;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn reset(&self) -> AutomationResult<()> {
        info!("Refreshing scan page");
        self.session.refresh().await?;
        confirm_phone(self.session, self.config, &self.phone).await?;
        if self.relocate_input().await? {
            Ok(())
        } else {
            Err(AutomationError::ElementNotFound("item input after refresh".to_string()))
        }
    }
}

#[cfg(test)]
#[path = "scan_test.rs"]
mod scan_test;
