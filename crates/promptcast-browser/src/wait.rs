//! Bounded waits on page state: element appearance (mutation driven) and
//! send-control enablement (polled).

use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::debug;

use crate::page::{ElementHandle, PageContext};
use crate::target::Selector;
use promptcast_core::Result;

/// Result of waiting for an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Found(ElementHandle),
    TimedOut,
}

/// Wait until `selector` matches an element, or `timeout` elapses.
///
/// Checks once up front. Otherwise observes body mutations and re-queries
/// after each batch. The subscription lives on this future's stack, so it
/// is torn down on every exit, including when the caller drops the future.
pub async fn wait_for_element(
    page: &dyn PageContext,
    selector: &Selector,
    timeout: Duration,
) -> Result<WaitOutcome> {
    if let Some(element) = page.query(selector).await? {
        return Ok(WaitOutcome::Found(element));
    }
    if timeout.is_zero() {
        return Ok(WaitOutcome::TimedOut);
    }

    let deadline = Instant::now() + timeout;
    let mut subscription = page.observe_mutations().await?;

    // The element may have appeared while the observer was being installed.
    if let Some(element) = page.query(selector).await? {
        subscription.close();
        return Ok(WaitOutcome::Found(element));
    }

    let mut source_open = true;
    while source_open {
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => break,
            batch = subscription.next_batch() => {
                if !batch {
                    debug!(selector = %selector, "mutation source closed");
                    source_open = false;
                    continue;
                }
                if let Some(element) = page.query(selector).await? {
                    subscription.close();
                    return Ok(WaitOutcome::Found(element));
                }
            }
        }
    }

    // Source gone: nothing can change what we observe before the deadline.
    if !source_open {
        sleep_until(deadline).await;
    }
    subscription.close();
    debug!(selector = %selector, ?timeout, "element wait timed out");
    Ok(WaitOutcome::TimedOut)
}

/// Poll for an enabled control matching `selector` and click it once.
///
/// Returns `false` if no enabled control turned up before `timeout`; in that
/// case nothing was clicked.
pub async fn wait_and_click(
    page: &dyn PageContext,
    selector: &Selector,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<bool> {
    if try_click(page, selector).await? {
        return Ok(true);
    }

    let start = Instant::now();
    let deadline = start + timeout;
    let poll_interval = poll_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(start + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => {
                debug!(selector = %selector, ?timeout, "send control never enabled");
                return Ok(false);
            }
            _ = ticker.tick() => {
                if try_click(page, selector).await? {
                    return Ok(true);
                }
            }
        }
    }
}

/// Click the matching control if it exists and is enabled.
async fn try_click(page: &dyn PageContext, selector: &Selector) -> Result<bool> {
    let Some(control) = page.query(selector).await? else {
        return Ok(false);
    };
    if page.is_disabled(&control).await? {
        return Ok(false);
    }
    page.click(&control).await?;
    Ok(true)
}
