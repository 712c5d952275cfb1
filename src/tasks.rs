//! Detecting a newly submitted job on a task list that hands back no id, and
//! collecting its printable artifact once the job completes.

use regex::Regex;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{LabelConfig, Timeouts};
use crate::errors::{AutomationError, AutomationResult};
use crate::locator::{Locator, WaitFor};
use crate::progress::Progress;
use crate::session::Session;
use crate::types::TaskId;
use crate::wait::poll_until;

lazy_static::lazy_static! {
    static ref TASK_ID_PARAM: Regex = Regex::new(r"task_id=(\d+)").unwrap();
}

/// Upper bound on scroll steps within one baseline pass
const MAX_STEPS_PER_PASS: usize = 500;

/// Pull a positive `task_id` out of a job link
pub fn task_id_from_href(href: &str) -> Option<TaskId> {
    let parsed = match url::Url::parse(href) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "task_id")
            .and_then(|(_, value)| value.parse::<u64>().ok()),
        // Relative links
        Err(_) => TASK_ID_PARAM
            .captures(href)
            .and_then(|caps| caps[1].parse::<u64>().ok()),
    };
    parsed.filter(|id| *id > 0).map(TaskId)
}

/// Largest known id, or 0 for an empty list
pub fn high_water_mark<'a, I>(ids: I) -> TaskId
where
    I: IntoIterator<Item = &'a TaskId>,
{
    ids.into_iter().max().copied().unwrap_or_default()
}

/// A job is new only when strictly above the mark taken before submission
pub fn is_new(id: TaskId, mark: TaskId) -> bool {
    id > mark
}

/// What the watcher needs from a lazily rendered task list
#[allow(async_fn_in_trait)]
pub trait TaskBoard {
    /// Ids of job links currently in the DOM
    async fn visible_task_ids(&self) -> AutomationResult<Vec<TaskId>>;

    async fn scroll_to_top(&self) -> AutomationResult<()>;

    /// Jump to the end, which may trigger more rows to load
    async fn scroll_to_end(&self) -> AutomationResult<()>;

    async fn scroll_height(&self) -> AutomationResult<i64>;

    /// Scroll down one step; `true` when the end was reached
    async fn scroll_step(&self) -> AutomationResult<bool>;

    async fn submit_batch(&self, payload: &str) -> AutomationResult<()>;

    /// The job's artifact control is present and enabled
    async fn artifact_ready(&self, task_id: TaskId) -> AutomationResult<bool>;

    /// Trigger the artifact control and return the captured document
    async fn capture_artifact(&self, task_id: TaskId) -> AutomationResult<Vec<u8>>;
}

/// The captured document of a newly detected job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskArtifact {
    pub task_id: TaskId,
    pub high_water_mark: TaskId,
    pub pdf: Vec<u8>,
}

pub struct TaskWatcher {
    task_detect: Duration,
    artifact_ready: Duration,
    poll_interval: Duration,
    scroll_settle: Duration,
    max_scroll_passes: usize,
}

impl TaskWatcher {
    pub fn new(timeouts: &Timeouts, max_scroll_passes: usize) -> Self {
        Self {
            task_detect: timeouts.task_detect(),
            artifact_ready: timeouts.artifact_ready(),
            poll_interval: timeouts.poll_interval(),
            scroll_settle: timeouts.scroll_settle(),
            max_scroll_passes: max_scroll_passes.max(1),
        }
    }

    /// Collect every id on the list.
    ///
    /// Each pass steps down from the top, reading the ids rendered at every
    /// position, then jumps to the end to make the list load more rows.
    /// Passes repeat until the end jump no longer grows the page.
    pub async fn baseline_scan<B: TaskBoard>(&self, board: &B) -> AutomationResult<BTreeSet<TaskId>> {
        let mut ids = BTreeSet::new();

        for pass in 1..=self.max_scroll_passes {
            let height = board.scroll_height().await?;
            self.walk_from_top(board, &mut ids).await?;

            board.scroll_to_end().await?;
            sleep(self.scroll_settle).await;
            ids.extend(board.visible_task_ids().await?);

            if board.scroll_height().await? == height {
                debug!("Task list fully scanned after {} pass(es), {} ids", pass, ids.len());
                return Ok(ids);
            }
        }

        warn!(
            "Task list still growing after {} passes, using what was seen",
            self.max_scroll_passes
        );
        Ok(ids)
    }

    async fn walk_from_top<B: TaskBoard>(
        &self,
        board: &B,
        ids: &mut BTreeSet<TaskId>,
    ) -> AutomationResult<()> {
        board.scroll_to_top().await?;
        sleep(self.scroll_settle).await;

        for _ in 0..MAX_STEPS_PER_PASS {
            ids.extend(board.visible_task_ids().await?);
            if board.scroll_step().await? {
                ids.extend(board.visible_task_ids().await?);
                return Ok(());
            }
            sleep(self.scroll_settle).await;
        }
        warn!("Stopped walking the task list after {} steps", MAX_STEPS_PER_PASS);
        Ok(())
    }

    /// Rescan, stepping down the list between attempts, until an id above `mark` shows up
    pub async fn detect_new_task<B: TaskBoard>(
        &self,
        board: &B,
        mark: TaskId,
    ) -> AutomationResult<TaskId> {
        board.scroll_to_top().await?;

        let found = poll_until(self.task_detect, self.poll_interval, move || async move {
            match board.visible_task_ids().await {
                Ok(ids) => {
                    if let Some(id) = ids.into_iter().filter(|id| is_new(*id, mark)).min() {
                        return Some(id);
                    }
                }
                Err(e) => debug!("Task scan failed: {}", e),
            }

            match board.scroll_step().await {
                Ok(true) => {
                    if let Err(e) = board.scroll_to_top().await {
                        debug!("Scroll to top failed: {}", e);
                    }
                }
                Ok(false) => {}
                Err(e) => debug!("Scroll step failed: {}", e),
            }
            None
        })
        .await;

        found.ok_or(AutomationError::TaskNotDetected {
            high_water_mark: mark,
            waited: self.task_detect,
        })
    }

    /// Wait until the job's artifact control becomes usable
    pub async fn await_ready<B: TaskBoard>(&self, board: &B, task_id: TaskId) -> AutomationResult<()> {
        poll_until(self.artifact_ready, self.poll_interval, move || async move {
            match board.artifact_ready(task_id).await {
                Ok(true) => Some(()),
                _ => None,
            }
        })
        .await
        .ok_or(AutomationError::ArtifactNotReady {
            task_id,
            waited: self.artifact_ready,
        })
    }

    /// Baseline, submit, detect, wait for completion, capture
    pub async fn submit_and_await<B: TaskBoard>(
        &self,
        board: &B,
        items: &[String],
        progress: &Progress,
    ) -> AutomationResult<TaskArtifact> {
        progress.say("Scanning existing tasks");
        let existing = self.baseline_scan(board).await?;
        let mark = high_water_mark(&existing);
        progress.say(format!(
            "{} existing task(s), highest id is {}",
            existing.len(),
            mark
        ));

        board.submit_batch(&items.join("\n")).await?;
        progress.say(format!("Submitted {} code(s)", items.len()));

        progress.say(format!("Waiting for a task newer than #{}", mark));
        let task_id = self.detect_new_task(board, mark).await?;
        progress.say(format!("Detected task #{}", task_id));

        progress.say(format!("Waiting for task #{} to finish", task_id));
        self.await_ready(board, task_id).await?;

        progress.say("Capturing label document");
        let pdf = board.capture_artifact(task_id).await?;
        info!(task_id = %task_id, bytes = pdf.len(), "Artifact captured");

        Ok(TaskArtifact {
            task_id,
            high_water_mark: mark,
            pdf,
        })
    }
}

/// Switch the label portal to the "other users" task view
pub async fn open_other_users(session: &Session, label: &LabelConfig) -> AutomationResult<()> {
    let timeouts = session.timeouts();
    session
        .click_locator(&label.other_users_tab, timeouts.element())
        .await?;
    sleep(timeouts.scroll_settle()).await;
    Ok(())
}

/// The shipping-label portal's task list
pub struct LabelBoard<'a> {
    session: &'a Session,
    config: &'a LabelConfig,
}

impl<'a> LabelBoard<'a> {
    pub fn new(session: &'a Session, config: &'a LabelConfig) -> Self {
        Self { session, config }
    }

    fn artifact_candidates(&self, task_id: TaskId) -> Vec<Locator> {
        self.config
            .artifact_controls
            .iter()
            .map(|locator| locator.for_task(task_id))
            .collect()
    }

    async fn print_current_tab(&self) -> AutomationResult<Vec<u8>> {
        sleep(self.session.timeouts().print_settle()).await;
        self.session.print_to_pdf().await
    }
}

impl TaskBoard for LabelBoard<'_> {
    async fn visible_task_ids(&self) -> AutomationResult<Vec<TaskId>> {
        let links = self.session.find_all(&self.config.task_links).await?;
        let mut ids = Vec::with_capacity(links.len());
        for link in links {
            // Rows can be re-rendered under us
            match link.attr("href").await {
                Ok(Some(href)) => ids.extend(task_id_from_href(&href)),
                Ok(None) => {}
                Err(e) => debug!("Skipping unreadable task link: {}", e),
            }
        }
        Ok(ids)
    }

    async fn scroll_to_top(&self) -> AutomationResult<()> {
        self.session.scroll_to_top().await
    }

    async fn scroll_to_end(&self) -> AutomationResult<()> {
        self.session.scroll_to_bottom().await
    }

    async fn scroll_height(&self) -> AutomationResult<i64> {
        Ok(self.session.scroll_position().await?.1)
    }

    async fn scroll_step(&self) -> AutomationResult<bool> {
        self.session.scroll_by(self.config.scroll_step_px).await?;
        let (bottom, height) = self.session.scroll_position().await?;
        Ok(bottom >= height)
    }

    async fn submit_batch(&self, payload: &str) -> AutomationResult<()> {
        let timeouts = self.session.timeouts();
        let input = self
            .session
            .wait_for(&self.config.batch_input, WaitFor::Visible, timeouts.element())
            .await?;
        self.session.fill(&input, payload).await?;
        self.session
            .click_locator(&self.config.submit_button, timeouts.element())
            .await
    }

    async fn artifact_ready(&self, task_id: TaskId) -> AutomationResult<bool> {
        let candidates = self.artifact_candidates(task_id);
        match self
            .session
            .find_first(&candidates, WaitFor::Clickable, Duration::ZERO)
            .await
        {
            Ok(_) => Ok(true),
            Err(AutomationError::ElementNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn capture_artifact(&self, task_id: TaskId) -> AutomationResult<Vec<u8>> {
        let timeouts = self.session.timeouts();
        let candidates = self.artifact_candidates(task_id);
        let (index, control) = self
            .session
            .find_first(&candidates, WaitFor::Clickable, timeouts.element())
            .await?;
        debug!("Artifact control for #{} matched {}", task_id, candidates[index]);

        let original = self.session.current_window().await?;
        let known = self.session.windows().await?;
        self.session.click(&control).await?;

        let print_tab = self
            .session
            .wait_for_new_window(&known, timeouts.new_window())
            .await?;
        self.session.switch_to(print_tab).await?;

        let result = self.print_current_tab().await;

        if let Err(e) = self.session.close_window().await {
            warn!("Failed to close print tab: {}", e);
        }
        self.session.switch_to(original).await?;
        result
    }
}

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tasks_test;
