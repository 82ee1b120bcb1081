// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Named one-shot timers driven by the tokio clock.
///
/// Adding a timer with the same event again replaces the previous deadline.
#[derive(Debug)]
pub(crate) struct DhcpTimerPool<T> {
    timers: HashMap<T, Instant>,
}

impl<T> Default for DhcpTimerPool<T> {
    fn default() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }
}

impl<T> DhcpTimerPool<T>
where
    T: std::fmt::Display + Eq + std::hash::Hash + Copy,
{
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_timer(&mut self, timeout: Duration, event: T) {
        log::debug!(
            "Adding timer {} milliseconds with event {} to timer pool",
            timeout.as_millis(),
            event
        );
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(far_future);
        self.timers.insert(event, deadline);
    }

    pub(crate) fn del_timer(&mut self, event: T) {
        if self.timers.remove(&event).is_some() {
            log::debug!("Deleted timer {event} from timer pool");
        }
    }

    pub(crate) fn remove_all(&mut self) {
        self.timers.clear();
    }

    fn earliest(&self) -> Option<(T, Instant)> {
        self.timers
            .iter()
            .min_by_key(|(_, deadline)| **deadline)
            .map(|(event, deadline)| (*event, *deadline))
    }

    /// Wait for the earliest timer to expire and remove it from the pool.
    /// Pending forever when no timer is armed.
    pub(crate) async fn wait(&mut self) -> T {
        match self.earliest() {
            Some((event, deadline)) => {
                tokio::time::sleep_until(deadline).await;
                self.timers.remove(&event);
                log::debug!("Timer {event} expired");
                event
            }
            None => std::future::pending().await,
        }
    }
}

// Roughly 30 years, as tokio does for its own far future deadline
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
