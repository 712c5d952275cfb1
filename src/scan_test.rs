use super::*;
use crate::progress::Stage;
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

#[derive(Default)]
struct FakePortal {
    failing: HashSet<String>,
    input_lost: bool,
    reset_fails: bool,
    attempted: RefCell<Vec<String>>,
    relocations: Cell<usize>,
    resets: Cell<usize>,
}

impl FakePortal {
    fn failing(items: &[&str]) -> Self {
        Self {
            failing: items.iter().map(|i| i.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl ScanPortal for FakePortal {
    async fn submit_item(&self, item: &str) -> AutomationResult<()> {
        self.attempted.borrow_mut().push(item.to_string());
        if self.failing.contains(item) {
            return Err(AutomationError::ElementNotInteractable(format!("confirm for {}", item)));
        }
        Ok(())
    }

    async fn relocate_input(&self) -> AutomationResult<bool> {
        self.relocations.set(self.relocations.get() + 1);
        Ok(!self.input_lost)
    }

    async fn reset(&self) -> AutomationResult<()> {
        self.resets.set(self.resets.get() + 1);
        if self.reset_fails {
            return Err(AutomationError::ElementNotFound("id=MobileNumber".into()));
        }
        Ok(())
    }
}

fn items(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("item{}", i)).collect()
}

fn scanner() -> BatchScanner {
    BatchScanner::new(&Timeouts::default())
}

#[tokio::test(start_paused = true)]
async fn test_one_failure_does_not_stop_the_batch() {
    let portal = FakePortal::failing(&["item3"]);
    let tally = scanner()
        .scan_batch(&portal, &items(5), &Progress::silent(Stage::StoreScan))
        .await;

    assert_eq!(
        tally,
        ScanTally {
            total: 5,
            success: 4,
            failed: 1,
            failed_list: vec!["item3".to_string()],
        }
    );
    assert_eq!(*portal.attempted.borrow(), items(5));
    assert_eq!(portal.relocations.get(), 1);
    assert_eq!(portal.resets.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_input_triggers_reset() {
    let portal = FakePortal {
        input_lost: true,
        ..FakePortal::failing(&["item2"])
    };
    let tally = scanner()
        .scan_batch(&portal, &items(3), &Progress::silent(Stage::StoreScan))
        .await;

    assert_eq!(tally.success, 2);
    assert_eq!(portal.relocations.get(), 1);
    assert_eq!(portal.resets.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reset_still_attempts_remaining_items() {
    let portal = FakePortal {
        input_lost: true,
        reset_fails: true,
        ..FakePortal::failing(&["item1", "item2"])
    };
    let tally = scanner()
        .scan_batch(&portal, &items(4), &Progress::silent(Stage::StoreScan))
        .await;

    assert_eq!(tally.failed_list, vec!["item1".to_string(), "item2".to_string()]);
    assert_eq!(tally.success, 2);
    assert_eq!(portal.attempted.borrow().len(), 4);
    assert_eq!(portal.resets.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch() {
    let portal = FakePortal::default();
    let tally = scanner()
        .scan_batch(&portal, &[], &Progress::silent(Stage::StoreScan))
        .await;
    assert_eq!(tally, ScanTally::default());
}

#[tokio::test(start_paused = true)]
async fn test_progress_lines_per_item() {
    let portal = FakePortal::failing(&["item2"]);
    let (progress, mut rx) = Progress::channel(Stage::StoreScan);
    scanner().scan_batch(&portal, &items(2), &progress).await;
    drop(progress);

    let mut messages = Vec::new();
    while let Some(event) = rx.recv().await {
        messages.push(event.message);
    }
    assert_eq!(messages[0], "[1/2] item1");
    assert_eq!(messages[1], "[2/2] item2");
    assert!(messages[2].starts_with("  failed:"));
}
