// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Poller - Repeats a request on a fixed tick until it is done or cancelled
//!
//! Used to follow long-running server work (flows, directory refreshes)
//! where the backend offers no push channel.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Fixed-interval polling with cancellation and stale-response guarding

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed-interval poller.
///
/// One request is in flight at a time. A slow request delays the next tick
/// instead of stacking requests behind it.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Poller {
    /// Interval is clamped to 1..=30 seconds.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until `is_done` accepts a response or `cancel` fires.
    ///
    /// Every successful response goes to `on_update` first. Failed
    /// iterations are logged and polling continues on the next tick.
    /// Returns `None` when cancelled.
    pub async fn run<T, E, F, Fut, U, D>(
        &self,
        cancel: &CancellationToken,
        mut request: F,
        mut on_update: U,
        is_done: D,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        U: FnMut(&T),
        D: Fn(&T) -> bool,
    {
        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iteration: u64 = 0;

        debug!(interval_ms = self.interval.as_millis() as u64, "Starting poller");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            iteration += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = request() => outcome,
            };

            match outcome {
                Ok(response) => {
                    on_update(&response);
                    if is_done(&response) {
                        debug!(iteration, "Poller finished");
                        return Some(response);
                    }
                }
                Err(e) => {
                    warn!(iteration, "Poll request failed: {}", e);
                }
            }
        }

        info!(iteration, "Poller cancelled");
        None
    }
}

/// Ticket identifying one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

/// Guards against out-of-order responses: only the most recently issued
/// request may apply its result.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding all earlier ones.
    pub fn next(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_interval_is_clamped() {
        assert_eq!(Poller::new(Duration::from_millis(10)).interval(), MIN_POLL_INTERVAL);
        assert_eq!(Poller::new(Duration::from_secs(120)).interval(), MAX_POLL_INTERVAL);
        assert_eq!(Poller::new(Duration::from_secs(5)).interval(), Duration::from_secs(5));
        assert_eq!(Poller::default().interval(), DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_survives_failures_and_stops_when_done() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut updates = Vec::new();
        let cancel = CancellationToken::new();

        let result = Poller::default()
            .run(
                &cancel,
                || {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n == 2 {
                            Err("transient")
                        } else {
                            Ok(n)
                        }
                    }
                },
                |n| updates.push(*n),
                |n| *n >= 4,
            )
            .await;

        assert_eq!(result, Some(4));
        assert_eq!(updates, vec![1, 3, 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_delays_next_tick_instead_of_bursting() {
        let cancel = CancellationToken::new();
        let mut starts = Vec::new();
        let mut calls = 0;

        let result = Poller::default()
            .run(
                &cancel,
                || {
                    calls += 1;
                    starts.push(tokio::time::Instant::now());
                    let n = calls;
                    async move {
                        if n == 1 {
                            tokio::time::sleep(Duration::from_millis(2500)).await;
                        }
                        Ok::<_, String>(n)
                    }
                },
                |_| {},
                |n| *n >= 3,
            )
            .await;

        assert_eq!(result, Some(3));
        assert_eq!(starts.len(), 3);
        // The late tick fires once on completion, then the period restarts.
        assert_eq!(starts[1] - starts[0], Duration::from_millis(2500));
        assert_eq!(starts[2] - starts[1], DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_returns_none_when_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let calls = AtomicUsize::new(0);

        let result = Poller::default()
            .run(
                &cancel,
                || {
                    if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                        trigger.cancel();
                    }
                    async { Ok::<_, String>(()) }
                },
                |_| {},
                |_| false,
            )
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poller_cancelled_before_start_never_requests() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Poller::default()
            .run(
                &cancel,
                || async { Ok::<_, String>(1) },
                |_| panic!("no update expected"),
                |_| true,
            )
            .await;
        assert_eq!(result, None);
    }

    #[test]
    fn test_only_latest_ticket_is_current() {
        let sequence = RequestSequence::new();
        let first = sequence.next();
        assert!(sequence.is_current(first));

        let second = sequence.next();
        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
        assert!(first < second);
    }
}
