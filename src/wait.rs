//! Bounded polling shared by every suspension point in the workflows.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Run `probe` until it yields `Some`, or `timeout` elapses.
///
/// The probe runs at least once, even with a zero timeout. Returns `None` once
/// the deadline passes without a result.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(interval.min(deadline - now)).await;
    }
}
