//! Session performance counters
//!
//! Cheap in-process counters recorded at the same call sites a metrics
//! exporter would hook: send, dispatch, timeout, and reconnect. Callers
//! read them through [`StatsSnapshot`], an owned copy taken at a point in
//! time; `pending_requests` is sampled from the live table by the session
//! when the snapshot is taken.
//!
//! The response-time figure is the mean over a sliding window of the most
//! recent successful round-trips only; timeouts and error responses do not
//! contribute.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Number of round-trip samples retained for the average.
const RESPONSE_TIME_WINDOW: usize = 100;

#[derive(Default)]
struct StatsInner {
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    timeouts: AtomicU64,
    errors: AtomicU64,
    reconnect_count: AtomicU64,
    response_times: Mutex<VecDeque<Duration>>,
}

/// Shared counter set owned by the session.
#[derive(Clone, Default)]
pub(crate) struct ClientStats {
    inner: Arc<StatsInner>,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_sent(&self) {
        self.inner.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_received(&self) {
        self.inner.responses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.inner.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Push one successful round-trip into the sliding window.
    pub fn record_response_time(&self, rtt: Duration) {
        let mut times = self
            .inner
            .response_times
            .lock()
            .expect("stats lock poisoned");
        if times.len() == RESPONSE_TIME_WINDOW {
            times.pop_front();
        }
        times.push_back(rtt);
    }

    /// Owned copy of the counters at this moment.
    pub fn snapshot(&self, pending_requests: usize) -> StatsSnapshot {
        let times = self
            .inner
            .response_times
            .lock()
            .expect("stats lock poisoned");
        let average_response_time = if times.is_empty() {
            Duration::ZERO
        } else {
            times.iter().sum::<Duration>() / times.len() as u32
        };
        StatsSnapshot {
            requests_sent: self.inner.requests_sent.load(Ordering::Relaxed),
            responses_received: self.inner.responses_received.load(Ordering::Relaxed),
            timeouts: self.inner.timeouts.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
            reconnect_count: self.inner.reconnect_count.load(Ordering::Relaxed),
            average_response_time,
            pending_requests,
        }
    }
}

/// Point-in-time view of the session counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests sent (notifications and stream initiations excluded).
    pub requests_sent: u64,
    /// Frames decoded as responses, matched or not.
    pub responses_received: u64,
    /// Requests that died on their deadline.
    pub timeouts: u64,
    /// Responses that carried an error member.
    pub errors: u64,
    /// Reconnect attempts made over the session lifetime.
    pub reconnect_count: u64,
    /// Mean of the most recent successful round-trips.
    pub average_response_time: Duration,
    /// In-flight requests at snapshot time.
    pub pending_requests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ClientStats::new();
        stats.record_request_sent();
        stats.record_request_sent();
        stats.record_response_received();
        stats.record_timeout();
        stats.record_error();
        stats.record_reconnect();

        let snapshot = stats.snapshot(1);
        assert_eq!(snapshot.requests_sent, 2);
        assert_eq!(snapshot.responses_received, 1);
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.reconnect_count, 1);
        assert_eq!(snapshot.pending_requests, 1);
    }

    #[test]
    fn average_is_the_mean_of_samples() {
        let stats = ClientStats::new();
        stats.record_response_time(Duration::from_millis(10));
        stats.record_response_time(Duration::from_millis(30));
        assert_eq!(
            stats.snapshot(0).average_response_time,
            Duration::from_millis(20)
        );
    }

    #[test]
    fn empty_window_averages_to_zero() {
        let stats = ClientStats::new();
        assert_eq!(stats.snapshot(0).average_response_time, Duration::ZERO);
    }

    #[test]
    fn window_is_bounded_to_the_most_recent_samples() {
        let stats = ClientStats::new();
        // 100 slow samples, then 100 fast ones push them all out
        for _ in 0..RESPONSE_TIME_WINDOW {
            stats.record_response_time(Duration::from_millis(100));
        }
        for _ in 0..RESPONSE_TIME_WINDOW {
            stats.record_response_time(Duration::from_millis(10));
        }
        assert_eq!(
            stats.snapshot(0).average_response_time,
            Duration::from_millis(10)
        );
    }
}
